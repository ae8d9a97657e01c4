// Periodic re-queueing of assemblies that still miss checksums

use super::jobs::EnrichmentJob;
use super::queue::EnrichmentJobQueue;
use crate::error::IngestError;
use crate::store::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Queue a checksum job for every stored assembly with unchecksummed sequences
///
/// Returns the number of jobs queued.
pub async fn sweep_missing_checksums(
    store: &dyn RecordStore,
    queue: &EnrichmentJobQueue,
) -> Result<usize, IngestError> {
    let accessions = store.find_assemblies_needing_checksum().await?;
    for accession in &accessions {
        queue.submit(EnrichmentJob::md5_checksums(accession.as_str()));
    }
    info!(queued = accessions.len(), "Missing-checksum sweep queued jobs");
    Ok(accessions.len())
}

/// Run [`sweep_missing_checksums`] every `period` until the task is aborted
pub fn spawn_checksum_sweep(
    store: Arc<dyn RecordStore>,
    queue: EnrichmentJobQueue,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = sweep_missing_checksums(store.as_ref(), &queue).await {
                error!(error = %e, "Missing-checksum sweep failed");
            }
        }
    })
}
