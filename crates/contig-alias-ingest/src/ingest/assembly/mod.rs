// Assembly report ingestion
//
// Resolution and download go through the shared FTP client, parsing is pure,
// and the service ties them to the record store and the enrichment queue.

pub mod ena_parser;
pub mod fetch;
pub mod ncbi_parser;
pub mod pipeline;
pub mod resolver;

pub use ena_parser::{collect_ena_names, merge_ena_names, EnaReportReader};
pub use fetch::ReportFetcher;
pub use ncbi_parser::parse_ncbi_report;
pub use pipeline::{AssemblyIngestionService, BatchFailure, BatchOutcome, IngestedAssembly};
pub use resolver::{AccessionPathResolver, ArchiveLayout, Resolution};
