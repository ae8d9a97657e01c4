//! Background enrichment of stored assemblies
//!
//! - `queue`: FIFO job queue drained by a single worker
//! - `dedup`: one in-flight task per assembly, bounded across assemblies
//! - `checksum`: MD5 lookups against the checksum service
//! - `sequence_name`: ENA sequence names from the ENA sequence report
//! - `dispatcher`: routes queued jobs to the two enrichments
//! - `sweep`: re-queues assemblies that still miss checksums

pub mod checksum;
pub mod dedup;
pub mod dispatcher;
pub mod jobs;
pub mod queue;
pub mod sequence_name;
pub mod sweep;

pub use checksum::{ChecksumEnricher, ChecksumRetriever, HttpChecksumRetriever};
pub use dedup::{DedupStatus, PerAssemblyTaskDeduplicator, TaskHandle, TaskResult};
pub use dispatcher::EnrichmentDispatcher;
pub use jobs::{EnrichmentJob, EnrichmentJobKind, EnrichmentSummary};
pub use queue::{EnrichmentJobQueue, JobHandler, QueueStatus};
pub use sequence_name::SequenceNameRetriever;
pub use sweep::{spawn_checksum_sweep, sweep_missing_checksums};
