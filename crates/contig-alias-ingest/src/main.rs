//! contig-alias - assembly ingestion tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use contig_alias_common::logging::{init_logging, LogConfig, LogLevel};
use contig_alias_common::Accession;
use contig_alias_ingest::config::IngestConfig;
use contig_alias_ingest::enrichment::{spawn_checksum_sweep, EnrichmentJobQueue, HttpChecksumRetriever};
use contig_alias_ingest::ingest::assembly::{parse_ncbi_report, EnaReportReader};
use contig_alias_ingest::ingest::common::{RetryPolicy, SuppaFtpFactory};
use contig_alias_ingest::models::ContigType;
use contig_alias_ingest::store::{InMemoryRecordStore, RecordStore};
use contig_alias_ingest::ContigAliasServices;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "contig-alias")]
#[command(author, version, about = "Genome assembly ingestion and enrichment")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest assemblies, wait for enrichment and print a JSON summary
    Ingest {
        /// Assembly accessions (GCA_... or GCF_...)
        #[arg(required = true)]
        accessions: Vec<String>,
    },

    /// Print the NCBI assembly report path for an accession
    Resolve {
        accession: String,
    },

    /// Parse a local report file and print its sequence counts
    ParseReport {
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Ncbi)]
        format: ReportFormat,

        file: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReportFormat {
    Ncbi,
    Ena,
}

#[derive(Serialize)]
struct IngestReport {
    succeeded: Vec<AssemblyReport>,
    failed: Vec<FailureReport>,
}

#[derive(Serialize)]
struct AssemblyReport {
    requested: String,
    insdc_accession: Option<String>,
    refseq_accession: Option<String>,
    name: String,
    chromosomes: usize,
    scaffolds: usize,
    with_md5: usize,
    with_ena_name: usize,
}

#[derive(Serialize)]
struct FailureReport {
    accession: String,
    transient: bool,
    error: String,
}

#[derive(Serialize)]
struct ReportCounts {
    accession: Option<String>,
    sequences: usize,
    chromosomes: usize,
    scaffolds: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("contig-alias")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = IngestConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Ingest { accessions } => ingest(&config, &accessions).await?,
        Command::Resolve { accession } => resolve(&config, &accession).await?,
        Command::ParseReport { format, file } => parse_report(format, file)?,
    }

    Ok(())
}

async fn ingest(config: &IngestConfig, accessions: &[String]) -> Result<()> {
    let checksums = HttpChecksumRetriever::new(&config.enrichment, RetryPolicy::from(&config.retry))
        .context("Failed to build checksum client")?;
    let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
    let services = ContigAliasServices::build(
        config,
        Arc::clone(&store),
        Arc::new(SuppaFtpFactory),
        Arc::new(checksums),
    );
    services.queue.start();

    let sweep = config
        .enrichment
        .sweep_interval()
        .map(|period| spawn_checksum_sweep(Arc::clone(&store), services.queue.clone(), period));

    info!(count = accessions.len(), "Ingesting assemblies");
    let outcome = services.ingestion.ingest_batch(accessions).await;

    wait_for_enrichment(&services.queue).await;
    if let Some(sweep) = sweep {
        sweep.abort();
    }

    let mut report = IngestReport {
        succeeded: Vec::with_capacity(outcome.succeeded.len()),
        failed: outcome
            .failed
            .into_iter()
            .map(|f| FailureReport {
                accession: f.accession,
                transient: f.error.is_transient(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    for ingested in outcome.succeeded {
        let stored = store
            .find_by_accession(&ingested.requested)
            .await?
            .with_context(|| format!("{} vanished from the store", ingested.requested))?;
        report.succeeded.push(AssemblyReport {
            requested: ingested.requested,
            insdc_accession: ingested.insdc_accession,
            refseq_accession: ingested.refseq_accession,
            name: ingested.name,
            chromosomes: ingested.chromosomes,
            scaffolds: ingested.scaffolds,
            with_md5: stored.sequences.iter().filter(|s| s.md5_checksum.is_some()).count(),
            with_ena_name: stored
                .sequences
                .iter()
                .filter(|s| s.ena_sequence_name.is_some())
                .count(),
        });
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn wait_for_enrichment(queue: &EnrichmentJobQueue) {
    let pending = queue.outstanding();
    if pending > 0 {
        info!(pending, "Waiting for enrichment jobs");
    }
    queue.wait_idle().await;
}

async fn resolve(config: &IngestConfig, accession: &str) -> Result<()> {
    let accession = Accession::parse(accession)?;
    let fetcher = ContigAliasServices::ncbi_fetcher(config, Arc::new(SuppaFtpFactory));

    let target = accession.clone();
    let path = tokio::task::spawn_blocking(move || fetcher.locate(&target))
        .await
        .context("Resolve task failed")??;

    println!(
        "{}",
        serde_json::json!({ "accession": accession.as_str(), "path": path })
    );
    Ok(())
}

fn parse_report(format: ReportFormat, file: PathBuf) -> Result<()> {
    let reader = BufReader::new(
        File::open(&file).with_context(|| format!("Failed to open {}", file.display()))?,
    );

    let counts = match format {
        ReportFormat::Ncbi => {
            let assembly = parse_ncbi_report(reader)?;
            ReportCounts {
                accession: assembly.primary_accession().map(str::to_string),
                sequences: assembly.sequences.len(),
                chromosomes: assembly.chromosomes().count(),
                scaffolds: assembly.scaffolds().count(),
            }
        },
        ReportFormat::Ena => {
            let mut counts = ReportCounts {
                accession: None,
                sequences: 0,
                chromosomes: 0,
                scaffolds: 0,
            };
            for record in EnaReportReader::new(reader) {
                counts.sequences += 1;
                match record?.contig_type {
                    ContigType::Chromosome => counts.chromosomes += 1,
                    ContigType::Scaffold => counts.scaffolds += 1,
                }
            }
            counts
        },
    };

    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
