//! osmend command-line interface.
//!
//! Thin driver around [`osmend_core::repair`]: argument parsing, logging
//! setup, and exit-code plumbing live here; the pipeline lives in the core
//! crate.

use anyhow::{Context, Result};
use clap::Parser;
use osmend_core::{repair, Config, Repair};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "osmend",
    version,
    about = "Repair dangling references in an OSM data file"
)]
struct Cli {
    /// Input OSM data file
    input: PathBuf,

    /// Output location. Existing files will be overwritten.
    output: PathBuf,

    /// OSM API endpoint (also settable via OSM_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Path to the osmium-tool binary (also settable via OSMEND_OSMIUM)
    #[arg(long)]
    osmium: Option<PathBuf>,

    /// Maximum concurrent API lookups
    #[arg(long, default_value_t = osmend_core::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(osmium) = cli.osmium {
        config.osmium_bin = osmium;
    }
    config.concurrency = cli.concurrency;

    let outcome = repair(&config, &cli.input, &cli.output)
        .await
        .with_context(|| format!("failed to repair {}", cli.input.display()))?;

    match outcome {
        Repair::Clean => {
            println!("nothing to repair: {} is consistent", cli.input.display());
        }
        Repair::Fixed {
            created,
            modified,
            dropped,
        } => {
            println!(
                "wrote {}: {created} feature(s) re-created, {dropped} reference(s) dropped across {modified} parent(s)",
                cli.output.display()
            );
        }
    }
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
