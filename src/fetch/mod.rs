//! Stage 1: concurrent, resumable download of the collection.
//!
//! - [`ResourceFetcher`] - one permit-gated fetch of one resource into one file
//! - [`BatchDownloadCoordinator`] - schedules the (metadata, image) pairs for a whole ID range

mod coordinator;
mod fetcher;

pub use coordinator::BatchDownloadCoordinator;
pub use fetcher::ResourceFetcher;
