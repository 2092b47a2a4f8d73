//! Subcommand implementations.

use anyhow::{Context, Result};
use genescout_common::SandboxClient;
use genescout_ingestion::enrichment::MetadataEnricher;
use genescout_ingestion::export::{default_report_path, read_metadata_csv, write_metadata_csv};
use genescout_ingestion::extraction::NerExtractor;
use genescout_ingestion::repository::MetadataRepository;
use genescout_ingestion::{ExtractionReport, GeneSymbolExtractor, PublicationId, StageOutcome};
use tracing::{info, warn};

use crate::config::Config;
use crate::{LoadArgs, RunArgs, SymbolsArgs};

/// Load the NER models once and assemble the standard cascade.
async fn build_extractor(config: &Config, client: SandboxClient) -> GeneSymbolExtractor {
    let mut ner = Vec::new();
    for model in config.ner.model_configs() {
        ner.push(NerExtractor::load(model).await);
    }
    if ner.is_empty() {
        info!("NER disabled by configuration");
    } else if !ner.iter().any(NerExtractor::is_available) {
        warn!("No NER model could be loaded; extraction will rely on annotation services and regex");
    }

    GeneSymbolExtractor::standard(client, &config.source_settings(), ner, config.regex_extractor())
}

fn log_problems(report: &ExtractionReport) {
    for (stage, reason) in report.problems() {
        warn!(stage, reason = %reason, "Extraction stage did not complete");
    }
}

pub async fn run(args: RunArgs, config: &Config, verbose: bool) -> Result<()> {
    let pmid = PublicationId::new(args.pmid.trim());
    let client = config.http_client()?;

    let extractor = build_extractor(config, client.clone()).await;
    let report = extractor.extract(&pmid).await;
    log_problems(&report);
    if report.is_empty() {
        warn!(pmid = %pmid, "No gene symbols found; nothing to enrich");
        return Ok(());
    }
    info!(pmid = %pmid, source = report.source.as_deref().unwrap_or("-"), symbols = %report.symbols, "Gene symbols extracted");

    let enricher = MetadataEnricher::new(client, &config.enrichment_settings());
    let rows = enricher.enrich(&report.symbols).await;

    let outfile = args
        .outfile
        .unwrap_or_else(|| default_report_path(&config.outdir(args.outdir), &pmid));
    if !write_metadata_csv(&outfile, &rows)? {
        return Ok(());
    }
    if verbose {
        println!("Data saved to {}", outfile.display());
    }

    if let Some(url) = args.database_url {
        let repo = MetadataRepository::connect(&url).await?;
        let summary = repo.insert_metadata(&rows).await?;
        if verbose {
            println!("Loaded {} genes and {} aliases", summary.genes, summary.aliases);
        }
    }
    Ok(())
}

pub async fn symbols(args: SymbolsArgs, config: &Config) -> Result<()> {
    let pmid = PublicationId::new(args.pmid.trim());
    let extractor = build_extractor(config, config.http_client()?).await;
    let report = extractor.extract(&pmid).await;
    log_problems(&report);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for attempt in &report.attempts {
        match &attempt.outcome {
            StageOutcome::Found(symbols) => println!("{:<10} found {}", attempt.stage, symbols.len()),
            StageOutcome::Empty(reason) => println!("{:<10} {}", attempt.stage, reason),
        }
    }
    for symbol in report.symbols.iter() {
        println!("{symbol}");
    }
    Ok(())
}

pub async fn load(args: LoadArgs) -> Result<()> {
    let rows = read_metadata_csv(&args.csv)?;
    if rows.is_empty() {
        warn!(csv = %args.csv.display(), "Report has no rows; nothing to load");
        return Ok(());
    }

    let repo = MetadataRepository::connect(&args.database_url).await?;
    let summary = repo
        .insert_metadata(&rows)
        .await
        .with_context(|| format!("Loading {}", args.csv.display()))?;
    println!("Loaded {} genes and {} aliases from {}", summary.genes, summary.aliases, args.csv.display());
    Ok(())
}
