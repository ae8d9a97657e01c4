// NCBI assembly report parser
//
// Header lines start with '#' and carry "tag: value" pairs. Data lines are
// tab separated:
//
//   0 Sequence-Name       5 Relationship
//   1 Sequence-Role       6 RefSeq-Accn
//   2 Assigned-Molecule   7 Assembly-Unit
//   3 Molecule-Type       8 Sequence-Length
//   4 GenBank-Accn        9 UCSC-style-name

use crate::error::ReportParseError;
use crate::models::{AssemblyRecord, ContigType, SequenceRecord};
use std::io::BufRead;
use tracing::debug;

const ASSEMBLED_MOLECULE: &str = "assembled-molecule";

const COL_NAME: usize = 0;
const COL_ROLE: usize = 1;
const COL_GENBANK: usize = 4;
const COL_RELATIONSHIP: usize = 5;
const COL_REFSEQ: usize = 6;
const COL_LENGTH: usize = 8;
const COL_UCSC: usize = 9;

/// Parse a complete NCBI assembly report into an assembly with its sequences
pub fn parse_ncbi_report<R: BufRead>(reader: R) -> Result<AssemblyRecord, ReportParseError> {
    let mut assembly = AssemblyRecord::default();
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(header) = line.strip_prefix('#') {
            apply_header(&mut assembly, header, idx + 1)?;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_ncbi_line(&line) {
            Some(sequence) => assembly.sequences.push(sequence),
            None => skipped += 1,
        }
    }

    if assembly.primary_accession().is_none() {
        return Err(ReportParseError::MissingAssemblyAccession);
    }

    debug!(
        accession = assembly.primary_accession().unwrap_or_default(),
        sequences = assembly.sequences.len(),
        skipped,
        "Parsed NCBI assembly report"
    );
    Ok(assembly)
}

/// Parse one data line; `None` when it has no usable GenBank accession
pub fn parse_ncbi_line(line: &str) -> Option<SequenceRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    let field = |idx: usize| fields.get(idx).map(|f| f.trim()).and_then(present);

    let insdc = field(COL_GENBANK)?;

    let role = fields.get(COL_ROLE).map(|f| f.trim()).unwrap_or_default();
    let relationship = fields.get(COL_RELATIONSHIP).map(|f| f.trim()).unwrap_or_default();
    let contig_type = if matches!(relationship, "=" | "<>") && role == ASSEMBLED_MOLECULE {
        ContigType::Chromosome
    } else {
        ContigType::Scaffold
    };

    let mut sequence = SequenceRecord::new(insdc, contig_type);
    sequence.genbank_sequence_name = field(COL_NAME).map(str::to_string);
    sequence.refseq_accession = field(COL_REFSEQ).map(str::to_string);
    sequence.seq_length = field(COL_LENGTH).and_then(|l| l.parse().ok());
    sequence.ucsc_name = field(COL_UCSC).map(str::to_string);
    Some(sequence)
}

fn apply_header(
    assembly: &mut AssemblyRecord,
    header: &str,
    line: usize,
) -> Result<(), ReportParseError> {
    let Some((tag, value)) = header.split_once(':') else {
        return Ok(());
    };
    let value = value.trim();

    match tag.trim() {
        "Assembly name" => assembly.name = value.to_string(),
        "Organism name" => assembly.organism = value.to_string(),
        "Taxid" => {
            assembly.taxonomy_id = value.parse().map_err(|_| ReportParseError::InvalidTaxid {
                line,
                value: value.to_string(),
            })?;
        },
        "GenBank assembly accession" => {
            assembly.insdc_accession = present(value).map(str::to_string);
        },
        "RefSeq assembly accession" => {
            assembly.refseq_accession = present(value).map(str::to_string);
        },
        "RefSeq assembly and GenBank assemblies identical" => {
            assembly.genbank_refseq_identical = value.eq_ignore_ascii_case("yes");
        },
        _ => {},
    }
    Ok(())
}

fn present(value: &str) -> Option<&str> {
    if value.is_empty() || value.eq_ignore_ascii_case("na") {
        None
    } else {
        Some(value)
    }
}
