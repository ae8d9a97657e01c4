//! Assembly ingestion service
//!
//! `ingest` takes one accession from validation to a stored assembly:
//!
//! 1. validate the accession
//! 2. reject it if the store already knows it
//! 3. resolve, download and parse the NCBI assembly report (blocking pool)
//! 4. reject it if the report's other accession is already stored
//! 5. save assembly and sequences as one unit
//! 6. queue enrichment (ENA sequence names, then MD5 checksums)

use super::fetch::ReportFetcher;
use super::ncbi_parser::parse_ncbi_report;
use crate::enrichment::{EnrichmentJob, EnrichmentJobQueue};
use crate::error::IngestError;
use crate::models::AssemblyRecord;
use crate::store::{RecordStore, StoreError};
use contig_alias_common::Accession;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Successful ingestion, summarised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedAssembly {
    pub requested: String,
    pub insdc_accession: Option<String>,
    pub refseq_accession: Option<String>,
    pub name: String,
    pub organism: String,
    pub chromosomes: usize,
    pub scaffolds: usize,
}

impl IngestedAssembly {
    fn new(requested: &str, assembly: &AssemblyRecord) -> Self {
        Self {
            requested: requested.to_string(),
            insdc_accession: assembly.insdc_accession.clone(),
            refseq_accession: assembly.refseq_accession.clone(),
            name: assembly.name.clone(),
            organism: assembly.organism.clone(),
            chromosomes: assembly.chromosomes().count(),
            scaffolds: assembly.scaffolds().count(),
        }
    }
}

/// One accession that failed within a batch
#[derive(Debug)]
pub struct BatchFailure {
    pub accession: String,
    pub error: IngestError,
}

/// Per-accession outcomes of [`AssemblyIngestionService::ingest_batch`]
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<IngestedAssembly>,
    pub failed: Vec<BatchFailure>,
}

pub struct AssemblyIngestionService {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<ReportFetcher>,
    queue: EnrichmentJobQueue,
    enqueue_sequence_names: bool,
}

impl AssemblyIngestionService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<ReportFetcher>,
        queue: EnrichmentJobQueue,
    ) -> Self {
        Self {
            store,
            fetcher,
            queue,
            enqueue_sequence_names: true,
        }
    }

    /// Whether to queue an ENA sequence-name job ahead of the checksum job
    pub fn with_sequence_names(mut self, enabled: bool) -> Self {
        self.enqueue_sequence_names = enabled;
        self
    }

    /// Ingest one assembly and queue its enrichment
    pub async fn ingest(&self, accession: &str) -> Result<AssemblyRecord, IngestError> {
        let accession = Accession::parse(accession)?;
        self.ensure_absent(accession.as_str(), accession.as_str()).await?;

        let fetcher = Arc::clone(&self.fetcher);
        let requested = accession.clone();
        let assembly = tokio::task::spawn_blocking(move || {
            fetcher.fetch(&requested, parse_ncbi_report)
        })
        .await
        .map_err(|e| IngestError::TaskFailed(format!("report fetch for {}: {}", accession, e)))??
        .ok_or_else(|| IngestError::AssemblyNotFound {
            accession: accession.to_string(),
        })?;

        // The report may name an accession stored under the other archive
        for other in assembly.accessions().filter(|a| *a != accession.as_str()) {
            self.ensure_absent(accession.as_str(), other).await?;
        }

        match self.store.save(assembly.clone()).await {
            Ok(()) => {},
            Err(StoreError::Conflict { .. }) => {
                // Lost a race with a concurrent ingestion of the same assembly
                let existing = self.store.find_by_accession(accession.as_str()).await?;
                return Err(match existing {
                    Some(existing) => IngestError::DuplicateAssembly {
                        requested: accession.to_string(),
                        existing: Box::new(existing),
                    },
                    None => IngestError::Store(StoreError::Conflict {
                        accession: accession.to_string(),
                    }),
                });
            },
            Err(e) => return Err(e.into()),
        }

        info!(
            %accession,
            name = %assembly.name,
            chromosomes = assembly.chromosomes().count(),
            scaffolds = assembly.scaffolds().count(),
            "Assembly ingested"
        );

        self.queue_enrichment(&assembly);
        Ok(assembly)
    }

    /// Ingest several accessions, isolating failures
    pub async fn ingest_batch<S: AsRef<str>>(&self, accessions: &[S]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for accession in accessions {
            let accession = accession.as_ref();
            match self.ingest(accession).await {
                Ok(assembly) => outcome
                    .succeeded
                    .push(IngestedAssembly::new(accession, &assembly)),
                Err(error) => {
                    warn!(accession, error = %error, "Assembly ingestion failed");
                    outcome.failed.push(BatchFailure {
                        accession: accession.to_string(),
                        error,
                    });
                },
            }
        }
        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Batch ingestion finished"
        );
        outcome
    }

    /// Stored assembly by either accession
    pub async fn get(&self, accession: &str) -> Result<Option<AssemblyRecord>, IngestError> {
        let accession = Accession::parse(accession)?;
        Ok(self.store.find_by_accession(accession.as_str()).await?)
    }

    /// Remove an assembly and its sequences; `false` when nothing was stored
    pub async fn delete(&self, accession: &str) -> Result<bool, IngestError> {
        let accession = Accession::parse(accession)?;
        let removed = self.store.delete_by_accession(accession.as_str()).await?;
        if removed {
            info!(%accession, "Assembly deleted");
        }
        Ok(removed)
    }

    async fn ensure_absent(&self, requested: &str, lookup: &str) -> Result<(), IngestError> {
        match self.store.find_by_accession(lookup).await? {
            Some(existing) => Err(IngestError::DuplicateAssembly {
                requested: requested.to_string(),
                existing: Box::new(existing),
            }),
            None => Ok(()),
        }
    }

    fn queue_enrichment(&self, assembly: &AssemblyRecord) {
        let Some(primary) = assembly.primary_accession() else {
            return;
        };
        if self.enqueue_sequence_names && assembly.insdc_accession.is_some() {
            self.queue.submit(EnrichmentJob::sequence_names(primary));
        }
        self.queue.submit(EnrichmentJob::md5_checksums(primary));
    }
}
