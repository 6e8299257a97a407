//! Rewrites each metadata record's image reference to point at the published images folder.

use crate::config::Config;
use crate::error::{Error, PublishError, Result};
use crate::store::{self, LocalStore};
use crate::types::{
    Cid, IdRange, NoopObserver, Progress, ProgressObserver, ResourceId, ResourceKind,
    RewriteReport, Stage,
};
use futures::{StreamExt, stream};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

enum RecordOutcome {
    Rewritten,
    Missing,
    Malformed,
    Failed,
}

/// Produces `pepes/metadata/<id>` from `metadata/<id>` for every ID in the range
///
/// Each record gets every configured alias key that is present set to
/// `<scheme><cid>/<id>.<ext>`; a record with none of them gets the first key inserted. Source
/// records are only ever read.
pub struct MetadataRewriter {
    store: LocalStore,
    range: IdRange,
    scheme: String,
    extension: String,
    image_keys: Vec<String>,
    parallelism: usize,
    observer: Arc<dyn ProgressObserver>,
}

impl MetadataRewriter {
    /// Build a rewriter from configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: LocalStore::new(&config.storage),
            range: config.id_range()?,
            scheme: config.publish.scheme.clone(),
            extension: config.publish.image_extension.clone(),
            image_keys: config.publish.image_keys.clone(),
            parallelism: config.publish.rewrite_parallelism,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Report progress to `observer` after each record
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Locator of image `id` under the images folder `cid`
    pub fn locator(&self, cid: &Cid, id: ResourceId) -> String {
        format!("{}{}/{}.{}", self.scheme, cid, id, self.extension)
    }

    /// Rewrite one record held in `bytes`
    ///
    /// Returns pretty-printed JSON with key order preserved. `path` is only used in the error.
    ///
    /// # Errors
    ///
    /// [`PublishError::MalformedRecord`] if `bytes` is not a JSON object.
    pub fn rewrite_record(&self, path: &Path, bytes: &[u8], locator: &str) -> Result<String> {
        let malformed = |reason: String| -> Error {
            PublishError::MalformedRecord {
                path: path.to_path_buf(),
                reason,
            }
            .into()
        };

        let mut value: Value = serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        let Some(record) = value.as_object_mut() else {
            return Err(malformed("top-level value is not an object".to_string()));
        };

        let mut replaced = false;
        for key in &self.image_keys {
            if let Some(slot) = record.get_mut(key) {
                *slot = Value::String(locator.to_string());
                replaced = true;
            }
        }
        if !replaced && let Some(primary) = self.image_keys.first() {
            record.insert(primary.clone(), Value::String(locator.to_string()));
        }

        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Rewrite every record in the range against the images folder `cid`
    ///
    /// Missing and malformed sources are warned about and skipped; a record whose destination
    /// cannot be written is counted as failed. None of these stop the pass. A skipped ID has no
    /// record in the destination afterwards, even if an earlier pass wrote one.
    ///
    /// # Errors
    ///
    /// Only if the destination folder cannot be created.
    pub async fn rewrite_all(&self, cid: &Cid) -> Result<RewriteReport> {
        let dest_dir = self.store.rewritten_dir();
        tokio::fs::create_dir_all(dest_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot create {}: {}", dest_dir.display(), e),
            ))
        })?;

        let total = self.range.len();
        tracing::info!(
            images_cid = %cid,
            total,
            dest = %dest_dir.display(),
            "Rewriting metadata"
        );

        let mut results = stream::iter(self.range.iter())
            .map(move |id| async move { (id, self.rewrite_one(cid, id).await) })
            .buffer_unordered(self.parallelism.max(1));

        let mut report = RewriteReport::default();
        let mut completed = 0;
        while let Some((id, outcome)) = results.next().await {
            match outcome {
                RecordOutcome::Rewritten => report.rewritten += 1,
                RecordOutcome::Missing => report.missing += 1,
                RecordOutcome::Malformed => report.malformed += 1,
                RecordOutcome::Failed => report.failed += 1,
            }
            completed += 1;
            self.observer.on_progress(Progress {
                stage: Stage::Rewrite,
                id,
                completed,
                total,
            });
        }

        tracing::info!(
            rewritten = report.rewritten,
            missing = report.missing,
            malformed = report.malformed,
            failed = report.failed,
            "Metadata rewrite finished"
        );
        Ok(report)
    }

    /// Rewrite one record; any other outcome leaves no destination behind
    async fn rewrite_one(&self, cid: &Cid, id: ResourceId) -> RecordOutcome {
        let dest = self.store.rewritten_path(id);
        let outcome = self.write_rewritten(cid, id, &dest).await;
        if !matches!(outcome, RecordOutcome::Rewritten) {
            remove_stale(id, &dest).await;
        }
        outcome
    }

    async fn write_rewritten(&self, cid: &Cid, id: ResourceId, dest: &Path) -> RecordOutcome {
        let source = self.store.resource_path(ResourceKind::Metadata, id);
        let bytes = match tokio::fs::read(&source).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(id = %id, path = %source.display(), "Metadata missing; skipping");
                return RecordOutcome::Missing;
            }
            Err(e) => {
                tracing::warn!(id = %id, path = %source.display(), error = %e, "Failed to read metadata");
                return RecordOutcome::Failed;
            }
        };

        let rewritten = match self.rewrite_record(&source, &bytes, &self.locator(cid, id)) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Malformed metadata; skipping");
                return RecordOutcome::Malformed;
            }
        };

        if let Err(e) = store::write_atomic(dest, rewritten.as_bytes()).await {
            tracing::warn!(id = %id, path = %dest.display(), error = %e, "Failed to write rewritten metadata");
            return RecordOutcome::Failed;
        }
        tracing::debug!(id = %id, path = %dest.display(), "Metadata rewritten");
        RecordOutcome::Rewritten
    }
}

/// A record left by an earlier pass would point at that pass's images CID
async fn remove_stale(id: ResourceId, dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => tracing::info!(id = %id, path = %dest.display(), "Removed rewritten metadata from a previous pass"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(id = %id, path = %dest.display(), error = %e, "Failed to remove outdated rewritten metadata"),
    }
}
