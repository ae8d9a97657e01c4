//! Contig Alias Common Library
//!
//! Shared types and utilities for the contig-alias workspace.
//!
//! - **Accessions**: validated INSDC/RefSeq assembly accessions
//! - **Logging**: centralised `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use contig_alias_common::Accession;
//!
//! let accession: Accession = "GCA_004051055.1".parse()?;
//! assert_eq!(accession.prefix(), "GCA");
//! # Ok::<(), contig_alias_common::AccessionError>(())
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod accession;
pub mod logging;

pub use accession::{Accession, AccessionError, AccessionKind};
