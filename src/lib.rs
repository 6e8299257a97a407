//! # pepe-pin
//!
//! Mirror an NFT collection from its HTTP store and republish it on IPFS.
//!
//! The pipeline has two stages:
//! - **Download** - fetch `metadata/<id>` and `pepes/<id>.png` for every ID in a range,
//!   concurrently and resumably, through one shared [`ConcurrencyLimiter`]
//! - **Publish** - add and pin the images folder, rewrite each metadata record so its image
//!   reference points at that folder's CID, then add and pin the rewritten metadata
//!
//! ## Quick Start
//!
//! ```no_run
//! use pepe_pin::fetch::BatchDownloadCoordinator;
//! use pepe_pin::publish::{IpfsCliAddresser, PublishCoordinator};
//! use pepe_pin::Config;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let token = CancellationToken::new();
//!     tokio::spawn(pepe_pin::cancel_on_signal(token.clone()));
//!
//!     let downloader = BatchDownloadCoordinator::new(&config, token)?;
//!     let summary = downloader.run(config.id_range()?).await?;
//!     println!("{} of {} IDs downloaded", summary.completed_ids, summary.total_ids);
//!
//!     let ipfs = IpfsCliAddresser::from_config(&config.publish)?;
//!     let mut publisher = PublishCoordinator::new(&config, Arc::new(ipfs))?;
//!     let outcome = publisher.run().await?;
//!     println!("images: ipfs://{}/", outcome.images_cid);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Concurrent resource download
pub mod fetch;
/// Global cap on in-flight requests
pub mod limiter;
/// IPFS publishing and metadata rewriting
pub mod publish;
/// On-disk layout and atomic writes
pub mod store;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, FetchConfig, PublishConfig, StorageConfig};
pub use error::{Error, FetchError, PublishError, Result};
pub use limiter::ConcurrencyLimiter;
pub use types::{
    Cid, FetchOutcome, FetchSummary, IdRange, NoopObserver, Progress, ProgressObserver,
    PublishOutcome, PublishState, ResourceId, ResourceKind, RewriteReport, RunStatus, Stage,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when a termination signal arrives.
///
/// Listens for SIGTERM and SIGINT on Unix and for Ctrl+C elsewhere. If no handler can be
/// installed the token is never cancelled by this function. Returns early without cancelling
/// if the token is cancelled by someone else first.
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => return,
        signal = termination() => {
            tracing::info!(signal, "Stopping; in-flight requests will be abandoned");
        }
    }
    token.cancel();
}

/// Resolves with the name of the first termination signal received
#[cfg(unix)]
async fn termination() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let install = |kind: SignalKind, name: &'static str| {
        signal(kind)
            .inspect_err(|e| tracing::warn!(signal = name, error = %e, "Could not install handler"))
            .ok()
    };

    match (
        install(SignalKind::terminate(), "SIGTERM"),
        install(SignalKind::interrupt(), "SIGINT"),
    ) {
        (Some(mut term), Some(mut int)) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        (Some(mut term), None) => {
            term.recv().await;
            "SIGTERM"
        }
        (None, Some(mut int)) => {
            int.recv().await;
            "SIGINT"
        }
        (None, None) => ctrl_c().await,
    }
}

#[cfg(not(unix))]
async fn termination() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C; signals will not stop the run");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
