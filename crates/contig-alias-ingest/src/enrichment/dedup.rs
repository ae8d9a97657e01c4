//! At most one in-flight enrichment task per assembly
//!
//! [`PerAssemblyTaskDeduplicator::trigger`] returns the existing handle while
//! a task for the accession is scheduled or running, and starts a new task
//! otherwise. The entry is removed when its task ends, whatever the outcome.
//! Registration and removal happen under the same lock, and a task only ever
//! removes the entry it registered.

use super::jobs::EnrichmentSummary;
use crate::error::IngestError;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const SCHEDULED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

/// Outcome shared by every holder of a [`TaskHandle`]
pub type TaskResult = Result<EnrichmentSummary, Arc<IngestError>>;

/// Cloneable handle to an in-flight task
#[derive(Clone)]
pub struct TaskHandle {
    id: u64,
    accession: Arc<str>,
    outcome: Shared<BoxFuture<'static, TaskResult>>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn accession(&self) -> &str {
        &self.accession
    }

    /// Wait for the task to end
    pub async fn wait(self) -> TaskResult {
        self.outcome.await
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("accession", &self.accession)
            .finish()
    }
}

/// Accessions with a task in flight
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupStatus {
    /// Holding a worker permit
    pub running: Vec<String>,
    /// Waiting for a worker permit
    pub scheduled: Vec<String>,
}

struct Entry {
    handle: TaskHandle,
    state: Arc<AtomicU8>,
}

struct DedupInner {
    tasks: Mutex<HashMap<String, Entry>>,
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
}

impl DedupInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deregisters a task on completion, panic or cancellation
struct Registration {
    inner: Arc<DedupInner>,
    accession: String,
    id: u64,
    state: Arc<AtomicU8>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.state.store(DONE, Ordering::SeqCst);
        let mut tasks = self.inner.lock();
        if tasks.get(&self.accession).map(|e| e.handle.id) == Some(self.id) {
            tasks.remove(&self.accession);
        }
    }
}

#[derive(Clone)]
pub struct PerAssemblyTaskDeduplicator {
    inner: Arc<DedupInner>,
}

impl PerAssemblyTaskDeduplicator {
    /// `worker_limit` bounds how many tasks run at once across assemblies
    pub fn new(worker_limit: usize) -> Self {
        Self {
            inner: Arc::new(DedupInner {
                tasks: Mutex::new(HashMap::new()),
                permits: Arc::new(Semaphore::new(worker_limit.max(1))),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Join the accession's in-flight task, or start `task` for it
    ///
    /// `task` is only called when no task is in flight.
    pub fn trigger<F, Fut>(&self, accession: &str, task: F) -> TaskHandle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EnrichmentSummary, IngestError>> + Send + 'static,
    {
        let mut tasks = self.inner.lock();
        if let Some(entry) = tasks.get(accession) {
            debug!(accession, task_id = entry.handle.id, "Joining in-flight enrichment task");
            return entry.handle.clone();
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(AtomicU8::new(SCHEDULED));
        let registration = Registration {
            inner: Arc::clone(&self.inner),
            accession: accession.to_string(),
            id,
            state: Arc::clone(&state),
        };
        let permits = Arc::clone(&self.inner.permits);
        let work = task();

        let join = tokio::spawn(async move {
            let registration = registration;
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| IngestError::TaskFailed(e.to_string()))?;
            registration.state.store(RUNNING, Ordering::SeqCst);
            work.await
        });

        let label = accession.to_string();
        let outcome = async move {
            match join.await {
                Ok(result) => result.map_err(Arc::new),
                Err(e) => {
                    warn!(accession = %label, error = %e, "Enrichment task did not complete");
                    Err(Arc::new(IngestError::TaskFailed(format!(
                        "enrichment of {}: {}",
                        label, e
                    ))))
                },
            }
        }
        .boxed()
        .shared();

        let handle = TaskHandle {
            id,
            accession: Arc::from(accession),
            outcome,
        };
        tasks.insert(
            accession.to_string(),
            Entry {
                handle: handle.clone(),
                state,
            },
        );
        debug!(accession, task_id = id, "Started enrichment task");
        handle
    }

    pub fn status(&self) -> DedupStatus {
        let tasks = self.inner.lock();
        let mut status = DedupStatus::default();
        for (accession, entry) in tasks.iter() {
            match entry.state.load(Ordering::SeqCst) {
                RUNNING => status.running.push(accession.clone()),
                SCHEDULED => status.scheduled.push(accession.clone()),
                _ => {},
            }
        }
        status.running.sort();
        status.scheduled.sort();
        status
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }
}
