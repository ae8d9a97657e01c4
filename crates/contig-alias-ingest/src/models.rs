// Assembly and sequence records produced by ingestion and mutated by enrichment

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a sequence is a placed chromosome or an unplaced scaffold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContigType {
    Chromosome,
    Scaffold,
}

impl ContigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContigType::Chromosome => "CHROMOSOME",
            ContigType::Scaffold => "SCAFFOLD",
        }
    }
}

impl fmt::Display for ContigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A genome assembly and the sequences it owns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRecord {
    /// GenBank/INSDC accession, e.g. `GCA_000003055.3`
    pub insdc_accession: Option<String>,

    /// RefSeq accession, e.g. `GCF_000003055.6`
    pub refseq_accession: Option<String>,

    pub name: String,

    pub organism: String,

    pub taxonomy_id: i64,

    pub genbank_refseq_identical: bool,

    /// Set by enrichment only
    pub md5_checksum: Option<String>,

    /// Set by enrichment only
    pub trunc512_checksum: Option<String>,

    #[serde(default)]
    pub sequences: Vec<SequenceRecord>,
}

impl AssemblyRecord {
    /// The identifier records are keyed by: INSDC when present, RefSeq otherwise
    pub fn primary_accession(&self) -> Option<&str> {
        self.insdc_accession
            .as_deref()
            .or(self.refseq_accession.as_deref())
    }

    /// Both identifiers, skipping the absent one
    pub fn accessions(&self) -> impl Iterator<Item = &str> {
        self.insdc_accession
            .as_deref()
            .into_iter()
            .chain(self.refseq_accession.as_deref())
    }

    pub fn has_accession(&self, accession: &str) -> bool {
        self.accessions().any(|a| a == accession)
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = &SequenceRecord> {
        self.sequences
            .iter()
            .filter(|s| s.contig_type == ContigType::Chromosome)
    }

    pub fn scaffolds(&self) -> impl Iterator<Item = &SequenceRecord> {
        self.sequences
            .iter()
            .filter(|s| s.contig_type == ContigType::Scaffold)
    }
}

/// One chromosome or scaffold of an assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub contig_type: ContigType,

    /// INSDC sequence accession, the secondary key within an assembly
    pub insdc_accession: String,

    pub genbank_sequence_name: Option<String>,

    pub ena_sequence_name: Option<String>,

    pub ucsc_name: Option<String>,

    pub refseq_accession: Option<String>,

    /// Absent when the report value did not parse
    pub seq_length: Option<u64>,

    pub md5_checksum: Option<String>,

    /// Primary accession of the owning assembly
    pub assembly_accession: Option<String>,
}

impl SequenceRecord {
    pub fn new(insdc_accession: impl Into<String>, contig_type: ContigType) -> Self {
        Self {
            contig_type,
            insdc_accession: insdc_accession.into(),
            genbank_sequence_name: None,
            ena_sequence_name: None,
            ucsc_name: None,
            refseq_accession: None,
            seq_length: None,
            md5_checksum: None,
            assembly_accession: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_accession_prefers_insdc() {
        let mut assembly = AssemblyRecord {
            insdc_accession: Some("GCA_000003055.3".to_string()),
            refseq_accession: Some("GCF_000003055.6".to_string()),
            ..Default::default()
        };
        assert_eq!(assembly.primary_accession(), Some("GCA_000003055.3"));
        assert!(assembly.has_accession("GCF_000003055.6"));

        assembly.insdc_accession = None;
        assert_eq!(assembly.primary_accession(), Some("GCF_000003055.6"));
        assert_eq!(assembly.accessions().count(), 1);
    }

    #[test]
    fn test_contig_type_serializes_upper_case() {
        let json = serde_json::to_string(&ContigType::Chromosome).unwrap();
        assert_eq!(json, "\"CHROMOSOME\"");
        assert_eq!(ContigType::Scaffold.to_string(), "SCAFFOLD");
    }
}
