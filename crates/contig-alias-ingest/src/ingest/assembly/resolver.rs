// Accession to remote path resolution
//
// NCBI: /genomes/all/GCA/004/051/055/GCA_004051055.1_ASM405105v1/
// ENA:  /pub/databases/ena/assembly/GCA_004/GCA_004051/GCA_004051055.1_sequence_report.txt

use crate::error::IngestError;
use crate::ingest::common::RetryingFtpClient;
use contig_alias_common::Accession;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const ENA_REPORT_SUFFIX: &str = "_sequence_report.txt";
const NCBI_REPORT_SUFFIX: &str = "_assembly_report.txt";

/// Directory layout of a remote assembly archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveLayout {
    /// One directory per assembly under `<prefix>/<d1>/<d2>/<d3>/`
    Ncbi,
    /// Sequence reports under `<prefix>_<d1>/<prefix>_<d1><d2>/`
    Ena,
}

impl ArchiveLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveLayout::Ncbi => "ncbi",
            ArchiveLayout::Ena => "ena",
        }
    }

    /// Directory, relative to the archive root, that holds the accession's entry
    pub fn directory(&self, accession: &Accession) -> String {
        let prefix = accession.prefix();
        let [d1, d2, d3] = accession.digit_groups();
        match self {
            ArchiveLayout::Ncbi => format!("{prefix}/{d1}/{d2}/{d3}/"),
            ArchiveLayout::Ena => format!("{prefix}_{d1}/{prefix}_{d1}{d2}/"),
        }
    }

    /// Whether a directory entry belongs to the accession
    pub fn matches(&self, entry: &str, accession: &Accession) -> bool {
        let named = entry.contains(accession.as_str());
        match self {
            ArchiveLayout::Ncbi => named,
            ArchiveLayout::Ena => named && entry.ends_with(ENA_REPORT_SUFFIX),
        }
    }

    /// Report file for a resolved entry path
    pub fn report_path(&self, resolved: &str) -> String {
        match self {
            ArchiveLayout::Ncbi => {
                let dir = resolved.trim_end_matches('/');
                let name = dir.rsplit('/').next().unwrap_or(dir);
                format!("{dir}/{name}{NCBI_REPORT_SUFFIX}")
            },
            ArchiveLayout::Ena => resolved.to_string(),
        }
    }
}

impl fmt::Display for ArchiveLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a path lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Absolute remote path of the matched entry
    Found(String),
    NotFound,
}

impl Resolution {
    pub fn into_path(self) -> Option<String> {
        match self {
            Resolution::Found(path) => Some(path),
            Resolution::NotFound => None,
        }
    }
}

/// Maps accessions onto entries of one remote archive
#[derive(Debug, Clone)]
pub struct AccessionPathResolver {
    layout: ArchiveLayout,
    base_path: String,
}

impl AccessionPathResolver {
    pub fn new(layout: ArchiveLayout, base_path: impl Into<String>) -> Self {
        let mut base_path = base_path.into();
        if !base_path.ends_with('/') {
            base_path.push('/');
        }
        Self { layout, base_path }
    }

    pub fn layout(&self) -> ArchiveLayout {
        self.layout
    }

    /// Absolute remote directory for the accession
    pub fn directory(&self, accession: &Accession) -> String {
        format!("{}{}", self.base_path, self.layout.directory(accession))
    }

    /// List the accession's directory and pick the first matching entry
    pub fn resolve(
        &self,
        client: &mut RetryingFtpClient,
        accession: &Accession,
    ) -> Result<Resolution, IngestError> {
        let directory = self.directory(accession);
        let entries = client.list_names(&directory)?;

        match entries.iter().find(|e| self.layout.matches(e, accession)) {
            Some(entry) => {
                let path = format!("{directory}{entry}");
                debug!(%accession, layout = %self.layout, path = %path, "Resolved remote path");
                Ok(Resolution::Found(path))
            },
            None => {
                debug!(%accession, layout = %self.layout, directory = %directory, "No matching remote entry");
                Ok(Resolution::NotFound)
            },
        }
    }
}
