//! genescout: gene symbols and gene metadata for a PubMed article.
//! Entry point for the command-line binary.

mod commands;
mod config;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Retrieve gene symbols mentioned in a publication and build a gene metadata report.
#[derive(Parser)]
#[command(name = "genescout", author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML or YAML); defaults to $GENESCOUT_CONFIG or ./genescout.toml
    #[arg(long, global = true, value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Write the log to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    logfile: Option<PathBuf>,

    /// Debug-level logging and progress on stdout
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract gene symbols, enrich them and write the CSV report
    Run(RunArgs),
    /// Extract gene symbols only and print the per-stage report
    Symbols(SymbolsArgs),
    /// Load an existing CSV report into a database
    Load(LoadArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// PubMed identifier of the article
    #[arg(long)]
    pub pmid: String,

    /// Output directory for the report
    #[arg(long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Report path; defaults to {outdir}/{pmid}_gene_metadata.csv
    #[arg(long, value_name = "FILE")]
    pub outfile: Option<PathBuf>,

    /// Also load the report into this database (sqlite://... or mysql://...)
    #[arg(long, env = "GENESCOUT_DATABASE_URL", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Args)]
pub struct SymbolsArgs {
    /// PubMed identifier of the article
    #[arg(long)]
    pub pmid: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct LoadArgs {
    /// CSV report to load
    #[arg(long, value_name = "FILE")]
    pub csv: PathBuf,

    /// Target database (sqlite://... or mysql://...)
    #[arg(long, env = "GENESCOUT_DATABASE_URL", value_name = "URL")]
    pub database_url: String,
}

fn init_logging(verbose: bool, logfile: Option<&Path>) -> Result<()> {
    let default_filter = if verbose { "genescout=debug,info" } else { "genescout=info,warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match logfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.logfile.as_deref())?;

    info!("genescout {}", env!("CARGO_PKG_VERSION"));
    let config = config::Config::load(cli.config_file.as_deref())?;

    match cli.command {
        Command::Run(args) => commands::run(args, &config, cli.verbose).await,
        Command::Symbols(args) => commands::symbols(args, &config).await,
        Command::Load(args) => commands::load(args).await,
    }
}
