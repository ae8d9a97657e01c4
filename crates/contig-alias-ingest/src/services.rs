// Wires the store, FTP transport and checksum service into running components

use crate::config::IngestConfig;
use crate::enrichment::{
    ChecksumEnricher, ChecksumRetriever, EnrichmentDispatcher, EnrichmentJobQueue,
    PerAssemblyTaskDeduplicator, SequenceNameRetriever,
};
use crate::ingest::assembly::{ArchiveLayout, AssemblyIngestionService, ReportFetcher};
use crate::ingest::common::{RetryPolicy, TransportFactory};
use crate::store::RecordStore;
use std::sync::Arc;

/// Ingestion service plus the enrichment machinery behind it
pub struct ContigAliasServices {
    pub store: Arc<dyn RecordStore>,
    pub ingestion: AssemblyIngestionService,
    pub queue: EnrichmentJobQueue,
    pub dispatcher: Arc<EnrichmentDispatcher>,
}

impl ContigAliasServices {
    /// Build every component; the queue worker starts with the first submitted job
    pub fn build(
        config: &IngestConfig,
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn TransportFactory>,
        checksums: Arc<dyn ChecksumRetriever>,
    ) -> Self {
        let policy = RetryPolicy::from(&config.retry);
        let fetcher = |endpoint, layout| {
            Arc::new(ReportFetcher::new(
                endpoint,
                layout,
                Arc::clone(&transport),
                policy,
                config.scratch_dir.clone(),
            ))
        };
        let ncbi = fetcher(config.ncbi.clone(), ArchiveLayout::Ncbi);
        let ena = fetcher(config.ena.clone(), ArchiveLayout::Ena);

        let enrichment = &config.enrichment;
        let checksum_enricher = Arc::new(ChecksumEnricher::new(
            Arc::clone(&store),
            checksums,
            enrichment.page_size,
            enrichment.lookup_concurrency,
        ));
        let names = Arc::new(SequenceNameRetriever::new(
            Arc::clone(&store),
            ena,
            enrichment.page_size,
        ));
        let dispatcher = Arc::new(EnrichmentDispatcher::new(
            checksum_enricher,
            names,
            PerAssemblyTaskDeduplicator::new(enrichment.worker_limit),
        ));

        let queue = EnrichmentJobQueue::new(dispatcher.clone());
        let ingestion = AssemblyIngestionService::new(Arc::clone(&store), ncbi, queue.clone())
            .with_sequence_names(enrichment.enqueue_sequence_names);

        Self {
            store,
            ingestion,
            queue,
            dispatcher,
        }
    }

    /// NCBI report fetcher on its own, for lookups outside the ingestion flow
    pub fn ncbi_fetcher(config: &IngestConfig, transport: Arc<dyn TransportFactory>) -> ReportFetcher {
        ReportFetcher::new(
            config.ncbi.clone(),
            ArchiveLayout::Ncbi,
            transport,
            RetryPolicy::from(&config.retry),
            config.scratch_dir.clone(),
        )
    }
}
