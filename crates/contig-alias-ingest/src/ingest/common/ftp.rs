//! Anonymous FTP sessions with retry
//!
//! [`RetryingFtpClient`] owns at most one live session, opened through a
//! [`TransportFactory`]. Connecting, listing and downloading each run under a
//! [`RetryPolicy`]; a failed attempt drops the session so the next attempt
//! starts on a fresh connection.
//!
//! Everything here blocks. Async callers go through
//! `tokio::task::spawn_blocking`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use contig_alias_ingest::config::FtpEndpoint;
//! use contig_alias_ingest::ingest::common::ftp::{RetryingFtpClient, SuppaFtpFactory};
//!
//! let mut client = RetryingFtpClient::new(
//!     FtpEndpoint::ncbi(),
//!     Arc::new(SuppaFtpFactory),
//!     RetryPolicy::default(),
//! );
//! let names = client.list_names("/genomes/all/GCA/004/051/055/")?;
//! client.download_file(&report_path, &local_path)?;
//! client.disconnect();
//! ```

use super::proxy;
use super::retry::RetryPolicy;
use crate::config::FtpEndpoint;
use crate::error::IngestError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use suppaftp::{FtpError, FtpStream, Status};
use tracing::{debug, info, warn};

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// One authenticated FTP session in passive binary mode
pub trait FtpTransport: Send {
    /// Entry names of a remote directory; an absent directory lists as empty
    fn list_names(&mut self, path: &str) -> Result<Vec<String>, IngestError>;

    /// Remote file size in bytes
    fn size(&mut self, path: &str) -> Result<u64, IngestError>;

    /// Stream a remote file into `sink`, returning the bytes written
    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, IngestError>;

    /// Close the session
    fn quit(&mut self) -> Result<(), IngestError>;
}

/// Opens sessions against an endpoint
pub trait TransportFactory: Send + Sync {
    /// Connect, log in, and switch to passive binary mode
    ///
    /// Must not leak a half-open session: on failure after the TCP connect
    /// the connection is closed before the error is returned.
    fn connect(&self, endpoint: &FtpEndpoint) -> Result<Box<dyn FtpTransport>, IngestError>;
}

/// Production factory backed by `suppaftp`
#[derive(Debug, Clone, Copy, Default)]
pub struct SuppaFtpFactory;

impl SuppaFtpFactory {
    fn open_stream(endpoint: &FtpEndpoint) -> Result<FtpStream, FtpError> {
        let timeout = endpoint.timeout();

        let stream = match &endpoint.proxy {
            Some(proxy) => {
                debug!(proxy = %proxy.address(), target = %endpoint.address(), "Connecting through proxy");
                let control = proxy::open_tunnel(proxy, &endpoint.address(), timeout)
                    .map_err(FtpError::ConnectionError)?;
                let data_proxy = proxy.clone();
                FtpStream::connect_with_stream(control)?.passive_stream_builder(move |addr| {
                    proxy::open_tunnel(&data_proxy, &addr.to_string(), timeout)
                        .map_err(FtpError::ConnectionError)
                })
            },
            None => {
                let address = resolve(endpoint)?;
                debug!(%address, "Connecting to FTP server");
                FtpStream::connect_timeout(address, timeout)?
            },
        };

        stream
            .get_ref()
            .set_read_timeout(Some(timeout))
            .map_err(FtpError::ConnectionError)?;
        Ok(stream)
    }

    fn login(stream: &mut FtpStream) -> Result<(), FtpError> {
        stream.login(ANONYMOUS_USER, ANONYMOUS_PASSWORD)?;
        stream.set_mode(suppaftp::Mode::Passive);
        stream.transfer_type(suppaftp::types::FileType::Binary)?;
        Ok(())
    }
}

impl TransportFactory for SuppaFtpFactory {
    fn connect(&self, endpoint: &FtpEndpoint) -> Result<Box<dyn FtpTransport>, IngestError> {
        let mut stream =
            Self::open_stream(endpoint).map_err(|e| ftp_error("connect", &endpoint.address(), e))?;

        if let Err(e) = Self::login(&mut stream) {
            if let Err(quit_err) = stream.quit() {
                debug!(error = %quit_err, "Failed to close session after login failure");
            }
            return Err(ftp_error("login", &endpoint.address(), e));
        }

        info!(host = %endpoint.host, port = endpoint.port, "FTP session established");
        Ok(Box::new(SuppaFtpTransport { stream }))
    }
}

fn resolve(endpoint: &FtpEndpoint) -> Result<SocketAddr, FtpError> {
    endpoint
        .address()
        .to_socket_addrs()
        .map_err(FtpError::ConnectionError)?
        .next()
        .ok_or_else(|| {
            FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("{} did not resolve", endpoint.address()),
            ))
        })
}

fn ftp_error(operation: &str, target: &str, err: FtpError) -> IngestError {
    IngestError::transient(format!("FTP {} {}", operation, target), err)
}

struct SuppaFtpTransport {
    stream: FtpStream,
}

impl FtpTransport for SuppaFtpTransport {
    fn list_names(&mut self, path: &str) -> Result<Vec<String>, IngestError> {
        match self.stream.nlst(Some(path)) {
            Ok(names) => Ok(names
                .iter()
                .map(|n| n.trim_end_matches('/'))
                .filter_map(|n| n.rsplit('/').next())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect()),
            Err(FtpError::UnexpectedResponse(response))
                if response.status == Status::FileUnavailable =>
            {
                debug!(path, "Remote directory does not exist");
                Ok(Vec::new())
            },
            Err(e) => Err(ftp_error("NLST", path, e)),
        }
    }

    fn size(&mut self, path: &str) -> Result<u64, IngestError> {
        self.stream
            .size(path)
            .map(|size| size as u64)
            .map_err(|e| ftp_error("SIZE", path, e))
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, IngestError> {
        self.stream
            .retr(path, |reader| {
                std::io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
            })
            .map_err(|e| ftp_error("RETR", path, e))
    }

    fn quit(&mut self) -> Result<(), IngestError> {
        self.stream.quit().map_err(|e| ftp_error("QUIT", "", e))
    }
}

/// Stateful FTP client for one endpoint
pub struct RetryingFtpClient {
    endpoint: FtpEndpoint,
    factory: Arc<dyn TransportFactory>,
    policy: RetryPolicy,
    session: Option<Box<dyn FtpTransport>>,
}

impl RetryingFtpClient {
    pub fn new(
        endpoint: FtpEndpoint,
        factory: Arc<dyn TransportFactory>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            endpoint,
            factory,
            policy,
            session: None,
        }
    }

    pub fn endpoint(&self) -> &FtpEndpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Open a session if none is live
    pub fn connect(&mut self) -> Result<(), IngestError> {
        let policy = self.policy;
        policy.run_blocking("ftp connect", |_| self.ensure_session().map(|_| ()))
    }

    /// List the entry names of a remote directory
    pub fn list_names(&mut self, path: &str) -> Result<Vec<String>, IngestError> {
        let policy = self.policy;
        let names = policy.run_blocking("ftp list", |_| {
            let result = self.ensure_session()?.list_names(path);
            if result.is_err() {
                self.drop_session();
            }
            result
        })?;
        debug!(path, entries = names.len(), "Listed remote directory");
        Ok(names)
    }

    /// Download `remote` into the local file `local`, verifying its size
    ///
    /// Returns the number of bytes written.
    pub fn download_file(&mut self, remote: &str, local: &Path) -> Result<u64, IngestError> {
        let policy = self.policy;
        let bytes = policy.run_blocking("ftp download", |attempt| {
            let result = self.download_once(remote, local);
            if let Err(e) = &result {
                if e.is_transient() {
                    debug!(remote, attempt, "Dropping session after failed download");
                    self.drop_session();
                }
            }
            result
        })?;
        info!(remote, local = %local.display(), bytes, "Downloaded file");
        Ok(bytes)
    }

    /// Close the live session, if any
    pub fn disconnect(&mut self) {
        self.drop_session();
    }

    fn ensure_session(&mut self) -> Result<&mut Box<dyn FtpTransport>, IngestError> {
        if self.session.is_none() {
            self.session = Some(self.factory.connect(&self.endpoint)?);
        }
        self.session.as_mut().ok_or_else(|| {
            IngestError::transient("ftp connect", "session unavailable after connect")
        })
    }

    fn drop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.quit() {
                debug!(error = %e, "Failed to quit FTP session gracefully");
            }
        }
    }

    fn download_once(&mut self, remote: &str, local: &Path) -> Result<u64, IngestError> {
        let session = self.ensure_session()?;
        let expected = session.size(remote)?;

        let file = File::create(local).map_err(|e| IngestError::io(local, e))?;
        let mut writer = BufWriter::new(file);
        let actual = session.retrieve(remote, &mut writer)?;
        writer.flush().map_err(|e| IngestError::io(local, e))?;

        if actual != expected {
            warn!(remote, expected, actual, "Downloaded size does not match server size");
            return Err(IngestError::DownloadSizeMismatch {
                path: remote.to_string(),
                expected,
                actual,
            });
        }
        Ok(actual)
    }
}

impl Drop for RetryingFtpClient {
    fn drop(&mut self) {
        self.drop_session();
    }
}
