//! Trait and types for content addressing

use crate::types::Cid;
use async_trait::async_trait;
use std::path::Path;

/// Options for one add-and-pin call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Glob patterns, relative to the added folder, left out of the tree
    pub exclude: Vec<String>,
}

impl AddOptions {
    /// Options excluding the given patterns
    pub fn excluding<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Adds a folder to a content-addressed store and pins it
///
/// The call is recursive and deterministic: the same tree always yields the same CID.
/// Implementations may shell out to an external tool or keep canned answers for tests.
///
/// # Examples
///
/// ```no_run
/// use pepe_pin::publish::{AddOptions, ContentAddresser, IpfsCliAddresser};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ipfs = IpfsCliAddresser::from_path().expect("ipfs binary not found");
/// let cid = ipfs
///     .add_and_pin(Path::new("pepes"), &AddOptions::excluding(["metadata/**"]))
///     .await?;
/// println!("images at ipfs://{cid}/");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ContentAddresser: Send + Sync {
    /// Add `path` recursively, pin it and return the CID of its root
    ///
    /// # Errors
    ///
    /// - [`crate::Error::ExternalTool`] if the collaborator cannot run or reports failure
    /// - [`crate::PublishError::CidParse`] if its acknowledgment has no CID for `path`
    async fn add_and_pin(&self, path: &Path, options: &AddOptions) -> crate::Result<Cid>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
