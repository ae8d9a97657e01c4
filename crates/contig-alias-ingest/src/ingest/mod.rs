//! Assembly ingestion
//!
//! - `common`: FTP transport, retry policy and proxy tunnelling
//! - `assembly`: path resolution, report parsers and the ingestion service

pub mod assembly;
pub mod common;

pub use assembly::{
    AccessionPathResolver, ArchiveLayout, AssemblyIngestionService, BatchOutcome, ReportFetcher,
    Resolution,
};
