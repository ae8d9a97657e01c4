//! Error taxonomy for ingestion and enrichment
//!
//! Only [`IngestError::TransientNetwork`] and
//! [`IngestError::DownloadSizeMismatch`] are retried by
//! [`RetryPolicy`](crate::ingest::common::retry::RetryPolicy); everything else
//! surfaces on the first attempt.

use crate::models::AssemblyRecord;
use crate::store::StoreError;
use contig_alias_common::AccessionError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    InvalidAccession(#[from] AccessionError),

    #[error("Assembly {accession} was not found in the remote archive")]
    AssemblyNotFound { accession: String },

    #[error("Assembly {requested} is already stored as {}", .existing.primary_accession().unwrap_or("<unidentified>"))]
    DuplicateAssembly {
        requested: String,
        existing: Box<AssemblyRecord>,
    },

    #[error("Network failure during {operation}: {message}")]
    TransientNetwork { operation: String, message: String },

    #[error("Downloaded {actual} bytes of {path} but the server reported {expected}")]
    DownloadSizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to parse report: {0}")]
    Parse(#[from] ReportParseError),

    #[error("Record store failure: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl IngestError {
    pub fn transient(operation: impl Into<String>, message: impl ToString) -> Self {
        IngestError::TransientNetwork {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IngestError::TransientNetwork { .. } | IngestError::DownloadSizeMismatch { .. }
        )
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::transient("http request", err)
    }
}

/// Failures while reading an assembly or sequence report
#[derive(Error, Debug)]
pub enum ReportParseError {
    #[error("Line {line}: taxid '{value}' is not an integer")]
    InvalidTaxid { line: usize, value: String },

    #[error("Report carries neither a GenBank nor a RefSeq assembly accession")]
    MissingAssemblyAccession,

    #[error("Failed to read report: {0}")]
    Read(#[from] std::io::Error),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
