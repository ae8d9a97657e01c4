// Routes queued jobs to the enrichment that implements them

use super::checksum::ChecksumEnricher;
use super::dedup::{PerAssemblyTaskDeduplicator, TaskHandle};
use super::jobs::{EnrichmentJob, EnrichmentJobKind};
use super::queue::JobHandler;
use super::sequence_name::SequenceNameRetriever;
use crate::error::IngestError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// [`JobHandler`] for both enrichment kinds
///
/// Checksum jobs go through the deduplicator, so a job for an assembly that
/// is already being checksummed joins the running task.
pub struct EnrichmentDispatcher {
    checksums: Arc<ChecksumEnricher>,
    names: Arc<SequenceNameRetriever>,
    deduplicator: PerAssemblyTaskDeduplicator,
}

impl EnrichmentDispatcher {
    pub fn new(
        checksums: Arc<ChecksumEnricher>,
        names: Arc<SequenceNameRetriever>,
        deduplicator: PerAssemblyTaskDeduplicator,
    ) -> Self {
        Self {
            checksums,
            names,
            deduplicator,
        }
    }

    pub fn deduplicator(&self) -> &PerAssemblyTaskDeduplicator {
        &self.deduplicator
    }

    /// Start (or join) checksum enrichment for one assembly
    pub fn trigger_checksums(&self, accession: &str) -> TaskHandle {
        let checksums = Arc::clone(&self.checksums);
        let target = accession.to_string();
        self.deduplicator
            .trigger(accession, move || async move { checksums.run(&target).await })
    }
}

#[async_trait]
impl JobHandler for EnrichmentDispatcher {
    async fn handle(&self, job: EnrichmentJob) -> Result<(), IngestError> {
        match job.kind {
            EnrichmentJobKind::Md5ChecksumUpdate => {
                let summary = self
                    .trigger_checksums(&job.accession)
                    .wait()
                    .await
                    .map_err(|e| IngestError::TaskFailed(e.to_string()))?;
                debug!(job = %job, updated = summary.sequences_updated, "Checksum job done");
            },
            EnrichmentJobKind::EnaSequenceNameUpdate => {
                let summary = self.names.run(&job.accession).await?;
                debug!(job = %job, updated = summary.sequences_updated, "Sequence name job done");
            },
        }
        Ok(())
    }
}
