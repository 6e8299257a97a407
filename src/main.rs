//! # pepe-pin CLI Entry Point
//!
//! `pepe-pin download` mirrors the collection, `pepe-pin publish` pins it to IPFS.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pepe_pin::fetch::BatchDownloadCoordinator;
use pepe_pin::publish::{IpfsCliAddresser, PublishCoordinator};
use pepe_pin::{Config, Progress, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Exit status after an interrupted download (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

/// Log a progress line every this many items
const PROGRESS_EVERY: u64 = 500;

/// Mirror the Pepe collection and republish it on IPFS.
#[derive(Parser, Debug)]
#[command(name = "pepe-pin", version, about)]
struct Cli {
    /// JSON configuration file; unspecified fields take their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data root holding metadata/ and pepes/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download metadata and images for every ID in the range.
    Download(DownloadArgs),
    /// Pin the images, rewrite metadata against their CID, pin the metadata.
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// First ID
    #[arg(long)]
    first: Option<u32>,

    /// Last ID, inclusive
    #[arg(long)]
    last: Option<u32>,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    #[command(flatten)]
    range: RangeArgs,

    /// Maximum concurrently outstanding requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Base URL of the remote store
    #[arg(long)]
    base_url: Option<Url>,
}

#[derive(Args, Debug)]
struct PublishArgs {
    #[command(flatten)]
    range: RangeArgs,

    /// Path to the ipfs executable
    #[arg(long)]
    ipfs_bin: Option<PathBuf>,

    /// IPFS API multiaddr
    #[arg(long)]
    ipfs_api: Option<String>,
}

impl RangeArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(first) = self.first {
            config.fetch.first_id = first;
        }
        if let Some(last) = self.last {
            config.fetch.last_id = last;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    match cli.command {
        Commands::Download(args) => download(config, args).await,
        Commands::Publish(args) => publish(config, args).await,
    }
}

async fn download(mut config: Config, args: DownloadArgs) -> anyhow::Result<ExitCode> {
    args.range.apply(&mut config);
    if let Some(concurrency) = args.concurrency {
        config.fetch.max_concurrency = concurrency;
    }
    if let Some(base_url) = args.base_url {
        config.fetch.base_url = base_url;
    }
    config.validate()?;

    let token = CancellationToken::new();
    tokio::spawn(pepe_pin::cancel_on_signal(token.clone()));

    let coordinator = BatchDownloadCoordinator::new(&config, token.clone())?
        .with_observer(Arc::new(log_progress));
    let summary = coordinator.run(config.id_range()?).await?;
    token.cancel();

    println!(
        "{}/{} IDs done: {} written, {} already present, {} remote errors, {} failed",
        summary.completed_ids,
        summary.total_ids,
        summary.written,
        summary.already_present,
        summary.remote_errors,
        summary.failed
    );
    match summary.status {
        RunStatus::Completed => Ok(ExitCode::SUCCESS),
        RunStatus::Interrupted => {
            eprintln!("Interrupted; run the same command again to resume");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

async fn publish(mut config: Config, args: PublishArgs) -> anyhow::Result<ExitCode> {
    args.range.apply(&mut config);
    if let Some(ipfs_bin) = args.ipfs_bin {
        config.publish.ipfs_path = Some(ipfs_bin);
    }
    if let Some(ipfs_api) = args.ipfs_api {
        config.publish.ipfs_api = Some(ipfs_api);
    }
    config.validate()?;

    let ipfs = IpfsCliAddresser::from_config(&config.publish)?;
    tracing::info!(binary = %ipfs.binary_path().display(), "Using ipfs CLI");

    let mut coordinator =
        PublishCoordinator::new(&config, Arc::new(ipfs))?.with_observer(Arc::new(log_progress));
    let outcome = coordinator.run().await.context("publish failed")?;

    println!("Images CID:   {}", outcome.images_cid);
    match &outcome.metadata_cid {
        Some(cid) => println!("Metadata CID: {cid}"),
        None => println!("Metadata CID: unknown (check the ipfs output above)"),
    }
    println!(
        "Metadata rewritten: {}, missing: {}, malformed: {}, failed: {}",
        outcome.rewrite.rewritten,
        outcome.rewrite.missing,
        outcome.rewrite.malformed,
        outcome.rewrite.failed
    );
    Ok(ExitCode::SUCCESS)
}

fn log_progress(progress: Progress) {
    if progress.completed % PROGRESS_EVERY == 0 || progress.completed == progress.total {
        tracing::info!(
            stage = ?progress.stage,
            completed = progress.completed,
            total = progress.total,
            "Progress"
        );
    }
}
