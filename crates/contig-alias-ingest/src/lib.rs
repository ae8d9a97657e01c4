//! Contig Alias ingestion and enrichment
//!
//! Ingests genome assembly reports from the NCBI and ENA FTP archives into a
//! record store, then enriches the stored sequences with ENA sequence names
//! and MD5 checksums in the background.
//!
//! # Modules
//!
//! - [`ingest`]: accession path resolution, retrying FTP client, report parsers
//!   and the ingestion service
//! - [`enrichment`]: job queue, per-assembly deduplication, retrievers, sweep
//! - [`store`]: record store interface and in-memory implementation
//! - [`config`]: environment-driven configuration
//!
//! # Example
//!
//! ```no_run
//! use contig_alias_ingest::config::IngestConfig;
//! use contig_alias_ingest::enrichment::HttpChecksumRetriever;
//! use contig_alias_ingest::ingest::common::{RetryPolicy, SuppaFtpFactory};
//! use contig_alias_ingest::store::InMemoryRecordStore;
//! use contig_alias_ingest::ContigAliasServices;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = IngestConfig::load()?;
//! let checksums = HttpChecksumRetriever::new(&config.enrichment, RetryPolicy::from(&config.retry))?;
//! let services = ContigAliasServices::build(
//!     &config,
//!     Arc::new(InMemoryRecordStore::new()),
//!     Arc::new(SuppaFtpFactory),
//!     Arc::new(checksums),
//! );
//! services.queue.start();
//!
//! let assembly = services.ingestion.ingest("GCA_000003055.3").await?;
//! services.queue.wait_idle().await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod enrichment;
pub mod error;
pub mod ingest;
pub mod models;
pub mod services;
pub mod store;

pub use error::{IngestError, ReportParseError};
pub use models::{AssemblyRecord, ContigType, SequenceRecord};
pub use services::ContigAliasServices;
