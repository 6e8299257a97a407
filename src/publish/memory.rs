//! In-memory content addresser with canned answers

use super::addresser::{AddOptions, ContentAddresser};
use crate::error::{Error, PublishError, Result};
use crate::types::Cid;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Canned answer for one call
#[derive(Clone, Debug)]
pub enum CannedResponse {
    /// Return this CID
    Cid(String),
    /// Behave as if the acknowledgment could not be parsed
    Unparseable(String),
    /// Behave as if the tool failed with this output
    ToolFailure(String),
}

/// One recorded call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddCall {
    /// Folder that was added
    pub path: PathBuf,
    /// Exclusion patterns passed with it
    pub exclude: Vec<String>,
    /// Entry names present in the folder at the time of the call, sorted
    pub entries: Vec<String>,
}

/// Content addresser that answers from a queue and records every call
///
/// Lets the publish pipeline run without an IPFS node. Answers are consumed in call order;
/// a call with no answer left fails as a tool error.
///
/// # Examples
///
/// ```
/// use pepe_pin::publish::{AddOptions, CannedAddresser, ContentAddresser};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fake = CannedAddresser::with_cids(["bafyimages", "bafymeta"]);
/// let cid = fake.add_and_pin(Path::new("pepes"), &AddOptions::default()).await?;
/// assert_eq!(cid.as_str(), "bafyimages");
/// assert_eq!(fake.calls().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CannedAddresser {
    responses: Mutex<VecDeque<CannedResponse>>,
    calls: Mutex<Vec<AddCall>>,
}

impl CannedAddresser {
    /// Answer calls with `responses` in order
    pub fn new(responses: impl IntoIterator<Item = CannedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer calls with these CIDs in order
    pub fn with_cids<I, S>(cids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(cids.into_iter().map(|c| CannedResponse::Cid(c.into())))
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<AddCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

async fn list_entries(path: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(path).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names
}

#[async_trait]
impl ContentAddresser for CannedAddresser {
    async fn add_and_pin(&self, path: &Path, options: &AddOptions) -> Result<Cid> {
        let call = AddCall {
            path: path.to_path_buf(),
            exclude: options.exclude.clone(),
            entries: list_entries(path).await,
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());
        match next {
            Some(CannedResponse::Cid(cid)) => Cid::parse(cid).map_err(|_| {
                PublishError::CidParse {
                    path: path.display().to_string(),
                    output: "canned CID is not valid".to_string(),
                }
                .into()
            }),
            Some(CannedResponse::Unparseable(output)) => Err(PublishError::CidParse {
                path: path.display().to_string(),
                output,
            }
            .into()),
            Some(CannedResponse::ToolFailure(output)) => Err(Error::ExternalTool {
                message: format!("canned failure for {}", path.display()),
                output,
            }),
            None => Err(Error::ExternalTool {
                message: format!("no canned response left for {}", path.display()),
                output: String::new(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_in_order_then_fails() {
        let fake = CannedAddresser::new([
            CannedResponse::Cid("bafyone".into()),
            CannedResponse::Unparseable("???".into()),
        ]);

        let first = fake
            .add_and_pin(Path::new("a"), &AddOptions::default())
            .await
            .unwrap();
        assert_eq!(first.as_str(), "bafyone");

        assert!(matches!(
            fake.add_and_pin(Path::new("b"), &AddOptions::default()).await,
            Err(Error::Publish(PublishError::CidParse { .. }))
        ));
        assert!(matches!(
            fake.add_and_pin(Path::new("c"), &AddOptions::default()).await,
            Err(Error::ExternalTool { .. })
        ));
        assert_eq!(fake.calls().len(), 3);
    }

    #[tokio::test]
    async fn records_folder_entries_at_call_time() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2.png"), b"b").unwrap();
        std::fs::write(dir.path().join("1.png"), b"a").unwrap();

        let fake = CannedAddresser::with_cids(["bafyroot"]);
        fake.add_and_pin(dir.path(), &AddOptions::excluding(["metadata/**"]))
            .await
            .unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].entries, vec!["1.png", "2.png"]);
        assert_eq!(calls[0].exclude, vec!["metadata/**"]);
    }

    #[tokio::test]
    async fn invalid_canned_cid_is_a_parse_error() {
        let fake = CannedAddresser::with_cids([""]);
        assert!(matches!(
            fake.add_and_pin(Path::new("a"), &AddOptions::default()).await,
            Err(Error::Publish(PublishError::CidParse { .. }))
        ));
    }
}
