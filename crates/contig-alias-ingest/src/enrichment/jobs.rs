//! Enrichment job definitions and statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an enrichment job updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentJobKind {
    /// Fill `ena_sequence_name` from the ENA sequence report
    EnaSequenceNameUpdate,
    /// Fill `md5_checksum` from the checksum service
    Md5ChecksumUpdate,
}

impl EnrichmentJobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentJobKind::EnaSequenceNameUpdate => "ENA_SEQUENCE_NAME_UPDATE",
            EnrichmentJobKind::Md5ChecksumUpdate => "MD5_CHECKSUM_UPDATE",
        }
    }
}

impl fmt::Display for EnrichmentJobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued unit of enrichment work for one assembly
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrichmentJob {
    pub kind: EnrichmentJobKind,
    pub accession: String,
}

impl EnrichmentJob {
    pub fn new(kind: EnrichmentJobKind, accession: impl Into<String>) -> Self {
        Self {
            kind,
            accession: accession.into(),
        }
    }

    pub fn sequence_names(accession: impl Into<String>) -> Self {
        Self::new(EnrichmentJobKind::EnaSequenceNameUpdate, accession)
    }

    pub fn md5_checksums(accession: impl Into<String>) -> Self {
        Self::new(EnrichmentJobKind::Md5ChecksumUpdate, accession)
    }
}

impl fmt::Display for EnrichmentJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.kind, self.accession)
    }
}

/// Counters for one enrichment run over one assembly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    pub accession: String,
    /// Sequences looked at
    pub sequences_examined: u64,
    /// Sequences whose enrichment fields were written
    pub sequences_updated: u64,
    /// Lookups that found no value
    pub lookups_missing: u64,
    /// Lookups that failed after retries
    pub lookups_failed: u64,
    /// Pages fetched from the store
    pub pages: u64,
    pub duration_secs: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnrichmentSummary {
    pub fn new(accession: impl Into<String>) -> Self {
        Self {
            accession: accession.into(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the run as completed
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    pub fn inc_examined(&mut self, count: u64) {
        self.sequences_examined += count;
    }

    pub fn inc_updated(&mut self, count: u64) {
        self.sequences_updated += count;
    }

    pub fn inc_missing(&mut self) {
        self.lookups_missing += 1;
    }

    pub fn inc_failed(&mut self) {
        self.lookups_failed += 1;
    }

    pub fn inc_pages(&mut self) {
        self.pages += 1;
    }
}
