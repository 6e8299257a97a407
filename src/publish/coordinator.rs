//! Publish pipeline: images, then rewritten metadata.

use super::addresser::{AddOptions, ContentAddresser};
use super::rewriter::MetadataRewriter;
use crate::config::Config;
use crate::error::{Error, PublishError, Result};
use crate::store::LocalStore;
use crate::types::{ProgressObserver, PublishOutcome, PublishState};
use std::path::Path;
use std::sync::Arc;

/// Runs the publish state machine
///
/// ```text
/// Init -> ImagesPublished -> MetadataRewritten -> MetadataPublished -> Done
///   \__________________________ Failed ___________________________/
/// ```
///
/// Metadata is rewritten only once the images folder has a CID, and the rewritten folder is
/// published only after every record has been processed.
pub struct PublishCoordinator {
    addresser: Arc<dyn ContentAddresser>,
    rewriter: MetadataRewriter,
    store: LocalStore,
    state: PublishState,
}

impl PublishCoordinator {
    /// Build a coordinator publishing through `addresser`
    pub fn new(config: &Config, addresser: Arc<dyn ContentAddresser>) -> Result<Self> {
        Ok(Self {
            addresser,
            rewriter: MetadataRewriter::new(config)?,
            store: LocalStore::new(&config.storage),
            state: PublishState::Init,
        })
    }

    /// Report rewrite progress to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.rewriter = self.rewriter.with_observer(observer);
        self
    }

    /// Current state
    pub fn state(&self) -> PublishState {
        self.state
    }

    /// Run every phase in order
    ///
    /// # Errors
    ///
    /// - [`PublishError::MissingStore`] if the images or metadata folder does not exist
    /// - [`Error::ExternalTool`] if either add-and-pin call fails
    /// - [`PublishError::CidParse`] if the images folder CID cannot be read
    ///
    /// An unreadable metadata folder CID is not an error: the outcome reports it as `None`.
    /// On any error the state is [`PublishState::Failed`].
    pub async fn run(&mut self) -> Result<PublishOutcome> {
        self.state = PublishState::Init;
        match self.run_phases().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(
                    state = %self.state,
                    addresser = self.addresser.name(),
                    error = %e,
                    "Publish failed"
                );
                self.transition(PublishState::Failed);
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self) -> Result<PublishOutcome> {
        require_dir(self.store.images_dir()).await?;
        require_dir(self.store.metadata_dir()).await?;

        let images_cid = self
            .addresser
            .add_and_pin(
                self.store.images_dir(),
                &AddOptions::excluding([self.store.rewritten_ignore_pattern()]),
            )
            .await?;
        tracing::info!(images_cid = %images_cid, "Images folder published");
        self.transition(PublishState::ImagesPublished);

        let rewrite = self.rewriter.rewrite_all(&images_cid).await?;
        self.transition(PublishState::MetadataRewritten);

        let metadata_cid = match self
            .addresser
            .add_and_pin(self.store.rewritten_dir(), &AddOptions::default())
            .await
        {
            Ok(cid) => Some(cid),
            Err(Error::Publish(PublishError::CidParse { path, output })) => {
                tracing::warn!(
                    path = %path,
                    output = %output.trim(),
                    "Metadata folder was added but its CID could not be read; reporting it as unknown"
                );
                None
            }
            Err(e) => return Err(e),
        };
        self.transition(PublishState::MetadataPublished);

        tracing::info!(
            images_cid = %images_cid,
            metadata_cid = metadata_cid.as_ref().map_or("unknown", |c| c.as_str()),
            "Publish complete"
        );
        self.transition(PublishState::Done);

        Ok(PublishOutcome {
            images_cid,
            metadata_cid,
            rewrite,
        })
    }

    fn transition(&mut self, next: PublishState) {
        tracing::info!(from = %self.state, to = %next, "Publish state changed");
        self.state = next;
    }
}

async fn require_dir(path: &Path) -> Result<()> {
    let is_dir = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        Ok(())
    } else {
        Err(PublishError::MissingStore {
            path: path.to_path_buf(),
        }
        .into())
    }
}
