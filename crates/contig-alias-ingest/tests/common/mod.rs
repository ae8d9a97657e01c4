//! Shared fixtures for the integration tests
//!
//! [`FakeArchive`] is an in-memory FTP tree served through
//! [`FakeTransportFactory`]. Tests can make the next N retrievals fail or
//! come back short, and count every connect, list and retrieve.

#![allow(dead_code)]

use async_trait::async_trait;
use contig_alias_ingest::config::{FtpEndpoint, IngestConfig, RetryConfig};
use contig_alias_ingest::enrichment::ChecksumRetriever;
use contig_alias_ingest::ingest::common::{FtpTransport, TransportFactory};
use contig_alias_ingest::IngestError;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,contig_alias_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fake FTP archive
// ============================================================================

#[derive(Default)]
struct ArchiveState {
    directories: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<u8>>,
    reported_sizes: HashMap<String, u64>,
    failing_connects: usize,
    failing_retrievals: usize,
    short_retrievals: usize,
}

#[derive(Default)]
pub struct FakeArchive {
    state: Mutex<ArchiveState>,
    pub connects: AtomicUsize,
    pub lists: AtomicUsize,
    pub retrievals: AtomicUsize,
}

impl FakeArchive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a file and list its name in the parent directory
    pub fn add_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
        let mut state = self.state.lock().unwrap();
        state.files.insert(path.to_string(), content.into());
        drop(state);
        self.add_entry(&format!("{dir}/"), name);
    }

    /// List `name` under `dir` without creating a file
    pub fn add_entry(&self, dir: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let entries = state.directories.entry(dir.to_string()).or_default();
        if !entries.iter().any(|e| e == name) {
            entries.push(name.to_string());
        }
    }

    /// Publish an NCBI assembly directory holding `report`
    pub fn add_ncbi_report(&self, accession: &str, assembly_name: &str, report: &str) {
        let entry = format!("{accession}_{assembly_name}");
        let dir = format!("/genomes/all/{}", ncbi_directory(accession));
        self.add_entry(&dir, &entry);
        self.add_file(&format!("{dir}{entry}/{entry}_assembly_report.txt"), report);
    }

    /// Publish an ENA sequence report
    pub fn add_ena_report(&self, accession: &str, report: &str) {
        let prefix = &accession[..3];
        let d1 = &accession[4..7];
        let d2 = &accession[7..10];
        self.add_file(
            &format!(
                "/pub/databases/ena/assembly/{prefix}_{d1}/{prefix}_{d1}{d2}/{accession}_sequence_report.txt"
            ),
            report,
        );
    }

    /// Make SIZE report `size` for `path` regardless of its content
    pub fn report_size(&self, path: &str, size: u64) {
        self.state.lock().unwrap().reported_sizes.insert(path.to_string(), size);
    }

    /// The next `n` connects are refused
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().unwrap().failing_connects = n;
    }

    /// The next `n` retrievals fail with a network error
    pub fn fail_next_retrievals(&self, n: usize) {
        self.state.lock().unwrap().failing_retrievals = n;
    }

    /// The next `n` retrievals deliver only half of the file
    pub fn truncate_next_retrievals(&self, n: usize) {
        self.state.lock().unwrap().short_retrievals = n;
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn retrieval_count(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }
}

/// `GCA/000/003/055/` for `GCA_000003055.3`
pub fn ncbi_directory(accession: &str) -> String {
    format!(
        "{}/{}/{}/{}/",
        &accession[..3],
        &accession[4..7],
        &accession[7..10],
        &accession[10..13]
    )
}

pub struct FakeTransportFactory {
    archive: Arc<FakeArchive>,
}

impl FakeTransportFactory {
    pub fn new(archive: Arc<FakeArchive>) -> Arc<Self> {
        Arc::new(Self { archive })
    }
}

impl TransportFactory for FakeTransportFactory {
    fn connect(&self, endpoint: &FtpEndpoint) -> Result<Box<dyn FtpTransport>, IngestError> {
        self.archive.connects.fetch_add(1, Ordering::SeqCst);
        let mut state = self.archive.state.lock().unwrap();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(IngestError::transient(
                format!("FTP connect {}", endpoint.address()),
                "connection refused",
            ));
        }
        drop(state);
        Ok(Box::new(FakeSession {
            archive: Arc::clone(&self.archive),
        }))
    }
}

struct FakeSession {
    archive: Arc<FakeArchive>,
}

impl FtpTransport for FakeSession {
    fn list_names(&mut self, path: &str) -> Result<Vec<String>, IngestError> {
        self.archive.lists.fetch_add(1, Ordering::SeqCst);
        let state = self.archive.state.lock().unwrap();
        Ok(state.directories.get(path).cloned().unwrap_or_default())
    }

    fn size(&mut self, path: &str) -> Result<u64, IngestError> {
        let state = self.archive.state.lock().unwrap();
        if let Some(size) = state.reported_sizes.get(path) {
            return Ok(*size);
        }
        state
            .files
            .get(path)
            .map(|content| content.len() as u64)
            .ok_or_else(|| IngestError::transient(format!("SIZE {path}"), "550 not found"))
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, IngestError> {
        self.archive.retrievals.fetch_add(1, Ordering::SeqCst);
        let mut state = self.archive.state.lock().unwrap();
        if state.failing_retrievals > 0 {
            state.failing_retrievals -= 1;
            return Err(IngestError::transient(format!("RETR {path}"), "connection reset"));
        }
        let truncate = state.short_retrievals > 0;
        if truncate {
            state.short_retrievals -= 1;
        }

        let content = state
            .files
            .get(path)
            .ok_or_else(|| IngestError::transient(format!("RETR {path}"), "550 not found"))?;
        let content = if truncate {
            &content[..content.len() / 2]
        } else {
            &content[..]
        };
        sink.write_all(content)
            .map_err(|e| IngestError::transient(format!("RETR {path}"), e))?;
        Ok(content.len() as u64)
    }

    fn quit(&mut self) -> Result<(), IngestError> {
        Ok(())
    }
}

// ============================================================================
// Fake checksum service
// ============================================================================

#[derive(Default)]
pub struct FakeChecksums {
    md5s: HashMap<String, String>,
    pub lookups: AtomicUsize,
}

impl FakeChecksums {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(entries: impl IntoIterator<Item = (String, String)>) -> Arc<Self> {
        Arc::new(Self {
            md5s: entries.into_iter().collect(),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChecksumRetriever for FakeChecksums {
    async fn retrieve_md5(&self, insdc_accession: &str) -> Result<Option<String>, IngestError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.md5s.get(insdc_accession).cloned())
    }
}

/// Deterministic fake MD5 for a sequence accession
pub fn md5_for(accession: &str) -> String {
    format!("md5-{accession}")
}

// ============================================================================
// Reports
// ============================================================================

pub struct ReportSpec<'a> {
    pub name: &'a str,
    pub insdc: Option<&'a str>,
    pub refseq: Option<&'a str>,
    pub chromosomes: usize,
    pub scaffolds: usize,
}

impl<'a> ReportSpec<'a> {
    pub fn genbank(accession: &'a str, chromosomes: usize, scaffolds: usize) -> Self {
        Self {
            name: "Bos_taurus_UMD_3.1",
            insdc: Some(accession),
            refseq: None,
            chromosomes,
            scaffolds,
        }
    }
}

pub fn chromosome_accession(idx: usize) -> String {
    format!("GK{:06}.2", idx + 1)
}

pub fn scaffold_accession(idx: usize) -> String {
    format!("AAFC03{:06}.1", idx + 1)
}

/// NCBI assembly report with the requested sequence mix
pub fn ncbi_report(spec: &ReportSpec<'_>) -> String {
    let mut report = format!(
        "# Assembly name:  {}\n\
         # Organism name:  Bos taurus (cattle)\n\
         # Taxid:          9913\n\
         # GenBank assembly accession: {}\n\
         # RefSeq assembly accession: {}\n\
         # RefSeq assembly and GenBank assemblies identical: no\n\
         #\n\
         # Sequence-Name\tSequence-Role\tAssigned-Molecule\tAssigned-Molecule-Location/Type\t\
         GenBank-Accn\tRelationship\tRefSeq-Accn\tAssembly-Unit\tSequence-Length\tUCSC-style-name\n",
        spec.name,
        spec.insdc.unwrap_or("na"),
        spec.refseq.unwrap_or("na"),
    );

    for idx in 0..spec.chromosomes {
        report.push_str(&format!(
            "{n}\tassembled-molecule\t{n}\tChromosome\t{}\t=\tAC_{:06}.1\tPrimary Assembly\t{}\tchr{n}\n",
            chromosome_accession(idx),
            idx + 1,
            1_000_000 + idx,
            n = idx + 1,
        ));
    }
    for idx in 0..spec.scaffolds {
        report.push_str(&format!(
            "ChrUn.{:05}\tunplaced-scaffold\tna\tna\t{}\t=\tNW_{:09}.1\tPrimary Assembly\t{}\tna\n",
            idx,
            scaffold_accession(idx),
            idx + 1,
            10_000 + idx,
        ));
    }
    report
}

/// ENA sequence report naming the first `named_chromosomes` chromosomes
pub fn ena_report(named_chromosomes: usize) -> String {
    let mut report = String::from(
        "accession\tsequence-name\tsequence-length\tsequence-role\treplicon-name\treplicon-type\tassembly-unit\n",
    );
    for idx in 0..named_chromosomes {
        report.push_str(&format!(
            "{}\t{}\t{}\tassembled-molecule\t{}\tChromosome\tPrimary Assembly\n",
            chromosome_accession(idx),
            idx + 1,
            1_000_000 + idx,
            idx + 1,
        ));
    }
    report
}

// ============================================================================
// Configuration
// ============================================================================

/// Defaults with no retry delay and downloads under `scratch`
pub fn test_config(scratch: &Path) -> IngestConfig {
    IngestConfig::default()
        .with_scratch_dir(scratch)
        .with_retry(RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        })
}
