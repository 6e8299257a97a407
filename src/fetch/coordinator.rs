//! Batch download over the whole ID range.

use super::fetcher::ResourceFetcher;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::store::{self, LocalStore};
use crate::types::{
    FetchOutcome, FetchSummary, IdRange, NoopObserver, Progress, ProgressObserver, ResourceId,
    ResourceKind, RunStatus, Stage,
};
use futures::{StreamExt, future, stream};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Downloads every (metadata, image) pair in a range into the local store
///
/// The two fetches of an ID run concurrently with each other and with other IDs; the only
/// thing they share is the [`ConcurrencyLimiter`]. A failure in one fetch is logged and
/// counted and never affects its siblings, so a run may leave an image without its metadata
/// (or the reverse) for a later rerun to fill in.
pub struct BatchDownloadCoordinator {
    fetcher: ResourceFetcher,
    store: LocalStore,
    base_url: Url,
    min_free_space: u64,
    cancel_token: CancellationToken,
    observer: Arc<dyn ProgressObserver>,
}

impl BatchDownloadCoordinator {
    /// Build a coordinator from configuration
    pub fn new(config: &Config, cancel_token: CancellationToken) -> Result<Self> {
        config.validate()?;
        let limiter = ConcurrencyLimiter::new(config.fetch.max_concurrency)?;
        let fetcher = ResourceFetcher::new(&config.fetch, limiter, cancel_token.clone())?;
        Ok(Self {
            fetcher,
            store: LocalStore::new(&config.storage),
            base_url: with_trailing_slash(config.fetch.base_url.clone()),
            min_free_space: config.storage.min_free_space,
            cancel_token,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Report progress to `observer` after each ID completes
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The local store this coordinator writes into
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Remote URL of one resource
    pub fn resource_url(&self, kind: ResourceKind, id: ResourceId) -> Result<Url> {
        self.base_url
            .join(&kind.remote_path(id))
            .map_err(|e| Error::config("fetch.base_url", format!("cannot build URL: {e}")))
    }

    /// Download every pair in `range`
    ///
    /// Cancelling the token stops new IDs from being scheduled and abandons in-flight
    /// requests; the summary then carries [`RunStatus::Interrupted`]. No destination file is
    /// ever left partially written, so a rerun resumes where this one stopped.
    ///
    /// # Errors
    ///
    /// Only setup failures are returned: the storage folders cannot be created, or the data
    /// root has less free space than configured. Per-resource failures are in the summary.
    pub async fn run(&self, range: IdRange) -> Result<FetchSummary> {
        self.store.ensure_fetch_dirs().await?;
        store::check_free_space(self.store.root(), self.min_free_space)?;
        self.store.remove_stale_parts().await?;

        let total = range.len();
        let window = self.fetcher.limiter().capacity().saturating_mul(2);
        tracing::info!(
            first = range.first,
            last = range.last,
            total,
            max_concurrency = self.fetcher.limiter().capacity(),
            root = %self.store.root().display(),
            "Starting download"
        );

        let cancel_token = self.cancel_token.clone();
        let mut results = stream::iter(range.iter())
            .take_while(move |_| future::ready(!cancel_token.is_cancelled()))
            .map(|id| self.fetch_pair(id))
            .buffer_unordered(window.max(1));

        let mut summary = FetchSummary::new(total);
        while let Some((id, outcomes)) = results.next().await {
            for outcome in &outcomes {
                summary.record(outcome);
            }
            let interrupted = outcomes
                .iter()
                .any(|o| matches!(o, Ok(FetchOutcome::Cancelled)));
            if interrupted {
                continue;
            }
            summary.completed_ids += 1;
            self.observer.on_progress(Progress {
                stage: Stage::Download,
                id,
                completed: summary.completed_ids,
                total,
            });
        }

        if self.cancel_token.is_cancelled() && summary.completed_ids < total {
            summary.status = RunStatus::Interrupted;
            tracing::warn!(
                completed = summary.completed_ids,
                total,
                "Download interrupted; rerun to resume"
            );
        } else {
            tracing::info!(
                written = summary.written,
                already_present = summary.already_present,
                remote_errors = summary.remote_errors,
                failed = summary.failed,
                "Download finished"
            );
        }
        Ok(summary)
    }

    async fn fetch_pair(&self, id: ResourceId) -> (ResourceId, [Result<FetchOutcome>; 2]) {
        let [metadata, image] = ResourceKind::ALL.map(|kind| self.fetch_one(kind, id));
        let (metadata, image) = tokio::join!(metadata, image);
        (id, [metadata, image])
    }

    async fn fetch_one(&self, kind: ResourceKind, id: ResourceId) -> Result<FetchOutcome> {
        let destination = self.store.resource_path(kind, id);
        let result = match self.resource_url(kind, id) {
            Ok(url) => self.fetcher.fetch(url.as_str(), &destination).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::warn!(
                id = id.get(),
                kind = %kind,
                error = %e,
                transient = e.is_transient(),
                "Fetch failed; a rerun will retry it"
            );
        }
        result
    }
}

/// `join` replaces the last path segment unless the base ends in `/`
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
