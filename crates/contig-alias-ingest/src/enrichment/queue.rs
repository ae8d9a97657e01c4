//! FIFO enrichment queue with a single worker
//!
//! Jobs are drained strictly in submission order by one worker task. The
//! worker sleeps on the queue's own [`Notify`] between batches. Each job runs
//! in its own task so that an error or a panic is reported against the job
//! and the worker carries on with the next one.
//!
//! The first [`EnrichmentJobQueue::submit`] made inside a Tokio runtime
//! spawns the worker on that runtime. Jobs submitted outside a runtime stay
//! queued until a later submission or an explicit [`EnrichmentJobQueue::start`].

use super::jobs::EnrichmentJob;
use crate::error::IngestError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Executes one enrichment job
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: EnrichmentJob) -> Result<(), IngestError>;
}

/// Snapshot of the queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Job being executed, rendered `<kind> : <accession>`
    pub current: Option<String>,
    /// Jobs waiting, in execution order
    pub queued: Vec<String>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<EnrichmentJob>,
    current: Option<EnrichmentJob>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    submitted: Notify,
    started: AtomicBool,
    /// Jobs submitted but not yet finished
    outstanding: watch::Sender<usize>,
    handler: Arc<dyn JobHandler>,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_job(&self) -> Option<EnrichmentJob> {
        let mut state = self.lock();
        let job = state.pending.pop_front();
        state.current = job.clone();
        job
    }

    fn finish_job(&self) {
        self.lock().current = None;
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Handle to the queue; clones share the same queue
#[derive(Clone)]
pub struct EnrichmentJobQueue {
    inner: Arc<QueueInner>,
}

impl EnrichmentJobQueue {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                submitted: Notify::new(),
                started: AtomicBool::new(false),
                outstanding,
                handler,
            }),
        }
    }

    /// Append a job and wake the worker, starting it if needed
    pub fn submit(&self, job: EnrichmentJob) {
        debug!(job = %job, "Enrichment job submitted");
        {
            // Counted before the job is visible to the worker
            let mut state = self.inner.lock();
            self.inner.outstanding.send_modify(|n| *n += 1);
            state.pending.push_back(job);
        }
        self.inner.submitted.notify_one();

        if !self.is_started() {
            if let Ok(runtime) = Handle::try_current() {
                self.spawn_worker(&runtime);
            }
        }
    }

    /// Spawn the worker on the current runtime; `None` if it is already running
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        self.spawn_worker(&Handle::current())
    }

    fn spawn_worker(&self, runtime: &Handle) -> Option<JoinHandle<()>> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return None;
        }
        let inner = Arc::clone(&self.inner);
        Some(runtime.spawn(run_worker(inner)))
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.lock();
        QueueStatus {
            current: state.current.as_ref().map(ToString::to_string),
            queued: state.pending.iter().map(ToString::to_string).collect(),
        }
    }

    /// Jobs submitted and not yet finished
    pub fn outstanding(&self) -> usize {
        *self.inner.outstanding.borrow()
    }

    /// Resolve once no job is queued or running
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

async fn run_worker(inner: Arc<QueueInner>) {
    info!("Enrichment worker started");
    loop {
        while let Some(job) = inner.next_job() {
            let handler = Arc::clone(&inner.handler);
            let label = job.to_string();
            debug!(job = %label, "Enrichment job started");

            match tokio::spawn(async move { handler.handle(job).await }).await {
                Ok(Ok(())) => info!(job = %label, "Enrichment job finished"),
                Ok(Err(e)) => error!(job = %label, error = %e, "Enrichment job failed"),
                Err(e) if e.is_panic() => error!(job = %label, "Enrichment job panicked"),
                Err(e) => error!(job = %label, error = %e, "Enrichment job aborted"),
            }

            inner.finish_job();
        }
        inner.submitted.notified().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::enrichment::jobs::EnrichmentJobKind;

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobHandler for Recorder {
        async fn handle(&self, job: EnrichmentJob) -> Result<(), IngestError> {
            self.seen.lock().unwrap().push(job.to_string());
            match job.accession.as_str() {
                "GCA_000000002.1" => Err(IngestError::TaskFailed("boom".to_string())),
                "GCA_000000003.1" => panic!("handler panic"),
                _ => Ok(()),
            }
        }
    }

    // No runtime here, so nothing starts the worker
    #[test]
    fn test_status_before_start_lists_queued_jobs() {
        let queue = EnrichmentJobQueue::new(Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        }));
        queue.submit(EnrichmentJob::sequence_names("GCA_000003055.3"));
        queue.submit(EnrichmentJob::md5_checksums("GCA_000003055.3"));

        let status = queue.status();
        assert_eq!(status.current, None);
        assert_eq!(
            status.queued,
            vec![
                "ENA_SEQUENCE_NAME_UPDATE : GCA_000003055.3",
                "MD5_CHECKSUM_UPDATE : GCA_000003055.3"
            ]
        );
        assert_eq!(queue.outstanding(), 2);
        assert!(!queue.is_started());
    }

    #[tokio::test]
    async fn test_submit_starts_worker() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let queue = EnrichmentJobQueue::new(recorder.clone());

        queue.submit(EnrichmentJob::md5_checksums("GCA_000003055.3"));
        assert!(queue.is_started());
        queue.wait_idle().await;

        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
        assert!(queue.start().is_none());
    }

    struct Noop;

    #[async_trait]
    impl JobHandler for Noop {
        async fn handle(&self, _job: EnrichmentJob) -> Result<(), IngestError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_settle_to_idle() {
        for round in 0..50 {
            let queue = EnrichmentJobQueue::new(Arc::new(Noop));
            queue.start();

            let submitters: Vec<_> = (0..8)
                .map(|t| {
                    let queue = queue.clone();
                    std::thread::spawn(move || {
                        for n in 0..200 {
                            queue.submit(EnrichmentJob::md5_checksums(format!(
                                "GCA_{:09}.1",
                                t * 1000 + n
                            )));
                        }
                    })
                })
                .collect();
            for submitter in submitters {
                submitter.join().unwrap();
            }

            tokio::time::timeout(std::time::Duration::from_secs(10), queue.wait_idle())
                .await
                .unwrap_or_else(|_| panic!("round {round}: queue never went idle"));
            assert_eq!(queue.outstanding(), 0);
            assert_eq!(queue.status(), QueueStatus::default());
        }
    }

    #[tokio::test]
    async fn test_worker_drains_in_order_and_survives_failures() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let queue = EnrichmentJobQueue::new(recorder.clone());

        for n in 1..=4 {
            queue.submit(EnrichmentJob::new(
                EnrichmentJobKind::Md5ChecksumUpdate,
                format!("GCA_00000000{}.1", n),
            ));
        }
        // The first submit already spawned the worker
        assert!(queue.start().is_none());
        queue.wait_idle().await;

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "MD5_CHECKSUM_UPDATE : GCA_000000001.1",
                "MD5_CHECKSUM_UPDATE : GCA_000000002.1",
                "MD5_CHECKSUM_UPDATE : GCA_000000003.1",
                "MD5_CHECKSUM_UPDATE : GCA_000000004.1",
            ]
        );
        assert_eq!(queue.status(), QueueStatus::default());

        // Worker is still alive after a failure and a panic
        queue.submit(EnrichmentJob::sequence_names("GCA_000000005.1"));
        queue.wait_idle().await;
        assert_eq!(recorder.seen.lock().unwrap().len(), 5);
    }
}
