//! MD5 checksum enrichment
//!
//! Sequences missing a checksum are read from the store a page at a time.
//! Lookups within a page run concurrently; the page is written back with a
//! single bulk update once every lookup has resolved.

use super::jobs::EnrichmentSummary;
use crate::config::EnrichmentConfig;
use crate::error::IngestError;
use crate::ingest::common::RetryPolicy;
use crate::store::RecordStore;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Looks up the MD5 of one INSDC sequence
#[async_trait]
pub trait ChecksumRetriever: Send + Sync {
    /// `Ok(None)` when the service has no checksum for the sequence
    async fn retrieve_md5(&self, insdc_accession: &str) -> Result<Option<String>, IngestError>;
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    metadata: SequenceMetadata,
}

#[derive(Debug, Deserialize)]
struct SequenceMetadata {
    md5: Option<String>,
}

/// Checksum lookups against the ENA CRAM reference registry
///
/// `GET <base>/ena/cram/sequence/insdc:<ACCESSION>/metadata`
pub struct HttpChecksumRetriever {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpChecksumRetriever {
    pub fn new(config: &EnrichmentConfig, policy: RetryPolicy) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("contig-alias/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, &config.checksum_base_url, policy))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn metadata_url(&self, insdc_accession: &str) -> String {
        format!(
            "{}/ena/cram/sequence/insdc:{}/metadata",
            self.base_url, insdc_accession
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<Option<String>, IngestError> {
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: MetadataResponse = response.json().await?;
                Ok(body.metadata.md5.filter(|m| !m.is_empty()))
            },
            status => Err(IngestError::transient(
                format!("GET {}", url),
                format!("unexpected status {}", status),
            )),
        }
    }
}

#[async_trait]
impl ChecksumRetriever for HttpChecksumRetriever {
    async fn retrieve_md5(&self, insdc_accession: &str) -> Result<Option<String>, IngestError> {
        let url = self.metadata_url(insdc_accession);
        self.policy
            .run("checksum lookup", |_| self.fetch_once(&url))
            .await
    }
}

/// Fills `md5_checksum` for every sequence of an assembly that lacks one
pub struct ChecksumEnricher {
    store: Arc<dyn RecordStore>,
    retriever: Arc<dyn ChecksumRetriever>,
    page_size: usize,
    lookup_concurrency: usize,
}

impl ChecksumEnricher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        retriever: Arc<dyn ChecksumRetriever>,
        page_size: usize,
        lookup_concurrency: usize,
    ) -> Self {
        Self {
            store,
            retriever,
            page_size: page_size.max(1),
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    pub async fn run(&self, assembly: &str) -> Result<EnrichmentSummary, IngestError> {
        let mut summary = EnrichmentSummary::new(assembly);
        let mut after: Option<String> = None;

        loop {
            let page = self
                .store
                .find_sequences_needing_checksum(assembly, after.as_deref(), self.page_size)
                .await?;
            if page.items.is_empty() {
                break;
            }
            summary.inc_pages();
            summary.inc_examined(page.items.len() as u64);

            let retriever = &self.retriever;
            let lookups: Vec<_> = stream::iter(page.items)
                .map(|sequence| async move {
                    let result = retriever.retrieve_md5(&sequence.insdc_accession).await;
                    (sequence, result)
                })
                .buffer_unordered(self.lookup_concurrency)
                .collect()
                .await;

            let mut updates = Vec::with_capacity(lookups.len());
            for (mut sequence, result) in lookups {
                match result {
                    Ok(Some(md5)) => {
                        sequence.md5_checksum = Some(md5);
                        updates.push(sequence);
                    },
                    Ok(None) => {
                        debug!(sequence = %sequence.insdc_accession, "No checksum available");
                        summary.inc_missing();
                    },
                    Err(e) => {
                        warn!(sequence = %sequence.insdc_accession, error = %e, "Checksum lookup failed");
                        summary.inc_failed();
                    },
                }
            }

            let updated = self.store.bulk_update_sequences(updates).await?;
            summary.inc_updated(updated as u64);
            debug!(assembly, page = summary.pages, updated, "Checksum page written");

            match page.next_token {
                Some(token) => after = Some(token),
                None => break,
            }
        }

        summary.complete();
        info!(
            assembly,
            examined = summary.sequences_examined,
            updated = summary.sequences_updated,
            missing = summary.lookups_missing,
            failed = summary.lookups_failed,
            "Checksum enrichment finished"
        );
        Ok(summary)
    }
}
