//! Shared FTP plumbing for report ingestion

pub mod ftp;
pub mod proxy;
pub mod retry;

pub use ftp::{FtpTransport, RetryingFtpClient, SuppaFtpFactory, TransportFactory};
pub use retry::RetryPolicy;
