// ENA sequence-name enrichment
//
// Downloads the assembly's ENA sequence report, folds it into an
// accession -> name map, then walks the stored sequences page by page and
// bulk-updates `ena_sequence_name`.

use super::jobs::EnrichmentSummary;
use crate::error::IngestError;
use crate::ingest::assembly::{collect_ena_names, merge_ena_names, ReportFetcher};
use crate::store::RecordStore;
use contig_alias_common::Accession;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SequenceNameRetriever {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<ReportFetcher>,
    page_size: usize,
}

impl SequenceNameRetriever {
    /// `fetcher` must target the ENA archive layout
    pub fn new(store: Arc<dyn RecordStore>, fetcher: Arc<ReportFetcher>, page_size: usize) -> Self {
        Self {
            store,
            fetcher,
            page_size: page_size.max(1),
        }
    }

    pub async fn run(&self, assembly: &str) -> Result<EnrichmentSummary, IngestError> {
        let mut summary = EnrichmentSummary::new(assembly);

        let Some(record) = self.store.find_by_accession(assembly).await? else {
            warn!(assembly, "Assembly is no longer stored, skipping sequence names");
            summary.complete();
            return Ok(summary);
        };
        let Some(insdc) = record.insdc_accession.as_deref() else {
            info!(assembly, "Assembly has no INSDC accession, skipping sequence names");
            summary.complete();
            return Ok(summary);
        };
        let insdc = Accession::parse(insdc)?;

        let fetcher = Arc::clone(&self.fetcher);
        let target = insdc.clone();
        let names = tokio::task::spawn_blocking(move || fetcher.fetch(&target, collect_ena_names))
            .await
            .map_err(|e| IngestError::TaskFailed(format!("ENA report fetch for {}: {}", insdc, e)))??;

        let Some(names) = names else {
            warn!(accession = %insdc, "No ENA sequence report found");
            summary.complete();
            return Ok(summary);
        };

        let mut after: Option<String> = None;
        loop {
            let page = self
                .store
                .find_sequences(assembly, after.as_deref(), self.page_size)
                .await?;
            if page.items.is_empty() {
                break;
            }
            summary.inc_pages();
            summary.inc_examined(page.items.len() as u64);

            let mut sequences = page.items;
            let merged = merge_ena_names(&mut sequences, &names);
            summary.lookups_missing += (sequences.len() - merged) as u64;
            let updates: Vec<_> = sequences
                .into_iter()
                .filter(|s| names.contains_key(&s.insdc_accession))
                .collect();

            let updated = self.store.bulk_update_sequences(updates).await?;
            summary.inc_updated(updated as u64);

            match page.next_token {
                Some(token) => after = Some(token),
                None => break,
            }
        }

        summary.complete();
        info!(
            accession = %insdc,
            names = names.len(),
            updated = summary.sequences_updated,
            "ENA sequence names updated"
        );
        Ok(summary)
    }
}
