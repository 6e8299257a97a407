//! Core types for pepe-pin

use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one paired (metadata, image) record in the collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Create a new ResourceId
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Inclusive range of resource IDs, `first..=last`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    /// First ID (at least 1)
    pub first: u32,
    /// Last ID (inclusive)
    pub last: u32,
}

impl IdRange {
    /// Create a range, rejecting ranges that start at 0 or run backwards
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first == 0 {
            return Err(crate::Error::config("fetch.first_id", "IDs start at 1"));
        }
        if last < first {
            return Err(crate::Error::config(
                "fetch.last_id",
                format!("last ID {last} is before first ID {first}"),
            ));
        }
        Ok(Self { first, last })
    }

    /// Number of IDs in the range
    pub fn len(&self) -> u64 {
        u64::from(self.last.saturating_sub(self.first)) + 1
    }

    /// Always false; a validated range holds at least one ID
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate the IDs in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ResourceId> + use<> {
        (self.first..=self.last).map(ResourceId::new)
    }
}

/// The two kinds of resource fetched per ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// JSON metadata record, `GET /metadata/<id>`
    Metadata,
    /// PNG image, `GET /pepes/<id>.png`
    Image,
}

impl ResourceKind {
    /// Both kinds, in the order they are scheduled
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Metadata, ResourceKind::Image];

    /// Path of this resource relative to the remote base URL
    pub fn remote_path(&self, id: ResourceId) -> String {
        match self {
            ResourceKind::Metadata => format!("metadata/{id}"),
            ResourceKind::Image => format!("pepes/{id}.png"),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Metadata => f.write_str("metadata"),
            ResourceKind::Image => f.write_str("image"),
        }
    }
}

/// Content identifier returned by the content-addressing service
///
/// Opaque to this crate. A value can only be built from a non-empty token without
/// whitespace or path separators, so holding a `Cid` means a publish actually succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Validate and wrap a CID token
    pub fn parse(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let valid = !token.is_empty()
            && !token.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\');
        if valid {
            Ok(Self(token))
        } else {
            Err(PublishError::InvalidCid(token).into())
        }
    }

    /// The CID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Cid {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self> {
        Cid::parse(value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one fetch that did not fail at the transport level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The destination already held content; no request was made
    AlreadyPresent,
    /// The body was downloaded and persisted
    Written {
        /// Number of bytes written
        bytes: u64,
    },
    /// The remote store answered with a non-2xx status; nothing was written
    RemoteStatus(u16),
    /// Cancellation fired before the body was persisted; nothing was written
    Cancelled,
}

/// How a download run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every ID in the range was processed
    Completed,
    /// Cancellation stopped the run early; rerunning resumes
    Interrupted,
}

/// Aggregate counts for a download run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    /// How the run ended
    pub status: RunStatus,
    /// IDs whose two fetches both finished
    pub completed_ids: u64,
    /// IDs in the requested range
    pub total_ids: u64,
    /// Resources downloaded and written in this run
    pub written: u64,
    /// Resources skipped because they were already on disk
    pub already_present: u64,
    /// Resources skipped because the remote answered non-2xx
    pub remote_errors: u64,
    /// Resources whose transfer or write failed
    pub failed: u64,
    /// Resources abandoned because of cancellation
    pub cancelled: u64,
}

impl FetchSummary {
    pub(crate) fn new(total_ids: u64) -> Self {
        Self {
            status: RunStatus::Completed,
            completed_ids: 0,
            total_ids,
            written: 0,
            already_present: 0,
            remote_errors: 0,
            failed: 0,
            cancelled: 0,
        }
    }

    pub(crate) fn record(&mut self, outcome: &Result<FetchOutcome>) {
        match outcome {
            Ok(FetchOutcome::AlreadyPresent) => self.already_present += 1,
            Ok(FetchOutcome::Written { .. }) => self.written += 1,
            Ok(FetchOutcome::RemoteStatus(_)) => self.remote_errors += 1,
            Ok(FetchOutcome::Cancelled) => self.cancelled += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Per-record counts for a metadata rewrite pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteReport {
    /// Records rewritten and written to the destination
    pub rewritten: u64,
    /// IDs with no source record
    pub missing: u64,
    /// Source records that were not a JSON object
    pub malformed: u64,
    /// Records whose destination could not be written
    pub failed: u64,
}

/// States of the publish pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    /// Nothing published yet
    Init,
    /// Images folder added and pinned; its CID is known
    ImagesPublished,
    /// Metadata records rewritten against the images CID
    MetadataRewritten,
    /// Rewritten metadata folder added and pinned
    MetadataPublished,
    /// Both CIDs reported
    Done,
    /// A phase failed; the pipeline stopped
    Failed,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Init => "init",
            PublishState::ImagesPublished => "images_published",
            PublishState::MetadataRewritten => "metadata_rewritten",
            PublishState::MetadataPublished => "metadata_published",
            PublishState::Done => "done",
            PublishState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final result of a publish run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// CID of the images-only folder
    pub images_cid: Cid,
    /// CID of the rewritten metadata folder; `None` when the acknowledgment could not be parsed
    pub metadata_cid: Option<Cid>,
    /// Per-record counts from the rewrite pass
    pub rewrite: RewriteReport,
}

/// Pipeline stage a progress update belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Downloading resource pairs
    Download,
    /// Rewriting metadata records
    Rewrite,
}

/// A single progress update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Stage reporting progress
    pub stage: Stage,
    /// The item that just finished
    pub id: ResourceId,
    /// Items finished so far
    pub completed: u64,
    /// Items in the run
    pub total: u64,
}

/// Receives progress updates
///
/// Called inline from the pipeline for every finished item, so implementations must be
/// cheap and must not block.
pub trait ProgressObserver: Send + Sync {
    /// Called after each item finishes
    fn on_progress(&self, progress: Progress);
}

/// Observer that ignores every update
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: Progress) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn on_progress(&self, progress: Progress) {
        self(progress)
    }
}
