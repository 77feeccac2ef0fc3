use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use foxml_inliner::{Config, Converter, Parallelism};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "foxml-inliner",
    version,
    about = "Rewrite managed FOXML datastreams into inline ones"
)]
struct Cli {
    /// Directory containing the container archives
    input_dir: PathBuf,

    /// Output directory (default: a fresh foxml_<uuid> directory under the temp dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Process containers and records one at a time
    #[arg(long, conflicts_with = "parallel_records")]
    single_threaded: bool,

    /// Process containers one at a time, parallelizing their records
    #[arg(long)]
    parallel_records: bool,

    /// Worker pool size (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Uses the `RUST_LOG` env var if set, otherwise falls back to the provided level.
fn init_logging(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn build_config(cli: Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    config.input_dir = cli.input_dir;
    if cli.output_dir.is_some() {
        config.output_dir = cli.output_dir;
    }
    if cli.single_threaded || cli.parallel_records {
        config.parallelism = Parallelism::from_flags(cli.single_threaded, cli.parallel_records)?;
    }
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let config = build_config(cli)?;
    let converter = Converter::from_config(config).context("invalid configuration")?;

    println!("Output directory: {}", converter.output_dir().display());
    println!("Ledger: {}", converter.ledger_path().display());

    let summary = converter.run().await.context("conversion run failed")?;

    println!(
        "Done: {} converted, {} written unconverted, {} skipped ({} container(s) processed, {} failed)",
        summary.converted,
        summary.fell_back,
        summary.dropped,
        summary.containers_processed,
        summary.containers_failed
    );
    Ok(())
}
