// Resolve, download and parse one report from one archive

use super::resolver::{AccessionPathResolver, ArchiveLayout, Resolution};
use crate::config::FtpEndpoint;
use crate::error::{IngestError, ReportParseError};
use crate::ingest::common::{RetryPolicy, RetryingFtpClient, TransportFactory};
use contig_alias_common::Accession;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

static NEXT_DOWNLOAD: AtomicU64 = AtomicU64::new(0);

/// Report source for one endpoint and archive layout
///
/// Blocking: every call opens its own FTP session, so run it on the blocking
/// pool.
pub struct ReportFetcher {
    endpoint: FtpEndpoint,
    resolver: AccessionPathResolver,
    factory: Arc<dyn TransportFactory>,
    policy: RetryPolicy,
    scratch_dir: PathBuf,
}

impl ReportFetcher {
    pub fn new(
        endpoint: FtpEndpoint,
        layout: ArchiveLayout,
        factory: Arc<dyn TransportFactory>,
        policy: RetryPolicy,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        let resolver = AccessionPathResolver::new(layout, endpoint.base_path.clone());
        Self {
            endpoint,
            resolver,
            factory,
            policy,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn layout(&self) -> ArchiveLayout {
        self.resolver.layout()
    }

    fn client(&self) -> RetryingFtpClient {
        RetryingFtpClient::new(self.endpoint.clone(), Arc::clone(&self.factory), self.policy)
    }

    /// Remote path of the accession's report, or `None` when absent
    pub fn locate(&self, accession: &Accession) -> Result<Option<String>, IngestError> {
        let mut client = self.client();
        self.locate_with(&mut client, accession)
    }

    fn locate_with(
        &self,
        client: &mut RetryingFtpClient,
        accession: &Accession,
    ) -> Result<Option<String>, IngestError> {
        Ok(match self.resolver.resolve(client, accession)? {
            Resolution::Found(entry) => Some(self.layout().report_path(&entry)),
            Resolution::NotFound => None,
        })
    }

    /// Download the accession's report and hand it to `parse`
    ///
    /// The downloaded file lives in the scratch directory only while `parse`
    /// runs. Returns `Ok(None)` when the archive has no entry for the accession.
    pub fn fetch<T, P>(&self, accession: &Accession, parse: P) -> Result<Option<T>, IngestError>
    where
        P: FnOnce(BufReader<File>) -> Result<T, ReportParseError>,
    {
        let mut client = self.client();
        let Some(remote) = self.locate_with(&mut client, accession)? else {
            return Ok(None);
        };

        std::fs::create_dir_all(&self.scratch_dir)
            .map_err(|e| IngestError::io(&self.scratch_dir, e))?;
        let local = self.scratch_file(accession);
        let _cleanup = ScratchFile(&local);

        let bytes = client.download_file(&remote, &local)?;
        client.disconnect();

        let file = File::open(&local).map_err(|e| IngestError::io(&local, e))?;
        let parsed = parse(BufReader::new(file))?;

        info!(%accession, layout = %self.layout(), remote = %remote, bytes, "Fetched report");
        Ok(Some(parsed))
    }

    fn scratch_file(&self, accession: &Accession) -> PathBuf {
        let id = NEXT_DOWNLOAD.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!(
            "{}-{}-{}-{}.txt",
            accession,
            self.layout(),
            std::process::id(),
            id
        ))
    }
}

/// Removes a scratch download when dropped
struct ScratchFile<'a>(&'a Path);

impl Drop for ScratchFile<'_> {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.0.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}
