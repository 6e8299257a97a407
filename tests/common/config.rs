//! Test configuration pointing the pipeline at a mock server and a scratch directory

use pepe_pin::Config;
use pepe_pin::config::{FetchConfig, StorageConfig};
use std::path::Path;
use std::time::Duration;
use url::Url;
use wiremock::MockServer;

/// Configuration for IDs `first..=last` served by `server` and stored under `data_dir`
///
/// The disk space check is disabled so tests run on nearly full CI disks.
pub fn test_config(server: &MockServer, data_dir: &Path, first: u32, last: u32) -> Config {
    Config {
        fetch: FetchConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            first_id: first,
            last_id: last,
            max_concurrency: 4,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        storage: StorageConfig {
            data_dir: data_dir.to_path_buf(),
            min_free_space: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}
