//! Configuration types for pepe-pin

use crate::error::{Error, Result};
use crate::types::IdRange;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};
use url::Url;

/// Remote store and download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL of the remote store (default: "https://data.peplicator.fun/")
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// First resource ID (default: 1)
    #[serde(default = "default_first_id")]
    pub first_id: u32,

    /// Last resource ID, inclusive (default: 22065)
    #[serde(default = "default_last_id")]
    pub last_id: u32,

    /// Maximum concurrently outstanding requests (default: 50)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Total timeout for one request, including the body (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            first_id: default_first_id(),
            last_id: default_last_id(),
            max_concurrency: default_max_concurrency(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Local storage layout
///
/// All paths are relative to `data_dir`. The rewritten metadata folder lives inside the
/// images folder so both are served from the same gateway tree, and it is excluded from
/// the images-only publish.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for everything the pipeline writes (default: ".")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Source metadata folder name (default: "metadata")
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: String,

    /// Images folder name (default: "pepes")
    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    /// Rewritten metadata folder name, nested inside the images folder (default: "metadata")
    #[serde(default = "default_metadata_dir")]
    pub rewritten_dir: String,

    /// Minimum free space in bytes required before downloading (default: 1 GiB, 0 disables)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            metadata_dir: default_metadata_dir(),
            images_dir: default_images_dir(),
            rewritten_dir: default_metadata_dir(),
            min_free_space: default_min_free_space(),
        }
    }
}

/// Metadata rewriting and IPFS publishing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Path to the ipfs executable (auto-detected if None)
    #[serde(default)]
    pub ipfs_path: Option<PathBuf>,

    /// IPFS API multiaddr passed as `--api` (uses the CLI's own default if None)
    #[serde(default)]
    pub ipfs_api: Option<String>,

    /// CID version requested from `ipfs add` (default: 1)
    #[serde(default = "default_cid_version")]
    pub cid_version: u8,

    /// Locator scheme prefix (default: "ipfs://")
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Image file extension used in locators (default: "png")
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Metadata keys treated as the image reference; the first is inserted when none exist
    /// (default: ["image", "image_url", "imageURI"])
    #[serde(default = "default_image_keys")]
    pub image_keys: Vec<String>,

    /// Records rewritten concurrently (default: 16)
    #[serde(default = "default_rewrite_parallelism")]
    pub rewrite_parallelism: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            ipfs_path: None,
            ipfs_api: None,
            cid_version: default_cid_version(),
            scheme: default_scheme(),
            image_extension: default_image_extension(),
            image_keys: default_image_keys(),
            rewrite_parallelism: default_rewrite_parallelism(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote store and download behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Local storage layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Rewriting and publishing
    #[serde(default)]
    pub publish: PublishConfig,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured ID range
    pub fn id_range(&self) -> Result<IdRange> {
        IdRange::new(self.fetch.first_id, self.fetch.last_id)
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        self.id_range()?;
        if self.fetch.max_concurrency == 0 {
            return Err(Error::config(
                "fetch.max_concurrency",
                "at least one concurrent request is required",
            ));
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::config(
                "fetch.request_timeout",
                "timeout must be greater than zero",
            ));
        }
        if self.fetch.base_url.cannot_be_a_base() {
            return Err(Error::config(
                "fetch.base_url",
                format!("{} cannot be used as a base URL", self.fetch.base_url),
            ));
        }
        for (key, value) in [
            ("storage.metadata_dir", &self.storage.metadata_dir),
            ("storage.images_dir", &self.storage.images_dir),
            ("storage.rewritten_dir", &self.storage.rewritten_dir),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(Error::config(
                    key,
                    format!("{value:?} must be a single folder name"),
                ));
            }
        }
        if self.publish.scheme.is_empty() {
            return Err(Error::config("publish.scheme", "scheme must not be empty"));
        }
        if self.publish.image_keys.is_empty() {
            return Err(Error::config(
                "publish.image_keys",
                "at least one image key is required",
            ));
        }
        if self.publish.rewrite_parallelism == 0 {
            return Err(Error::config(
                "publish.rewrite_parallelism",
                "parallelism must be at least 1",
            ));
        }
        Ok(())
    }
}

#[allow(clippy::expect_used)]
fn default_base_url() -> Url {
    Url::parse("https://data.peplicator.fun/").expect("static URL is valid")
}

fn default_first_id() -> u32 {
    1
}

fn default_last_id() -> u32 {
    22_065
}

fn default_max_concurrency() -> usize {
    50
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    concat!("pepe-pin/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_metadata_dir() -> String {
    "metadata".to_string()
}

fn default_images_dir() -> String {
    "pepes".to_string()
}

fn default_min_free_space() -> u64 {
    1024 * 1024 * 1024
}

fn default_cid_version() -> u8 {
    1
}

fn default_scheme() -> String {
    "ipfs://".to_string()
}

fn default_image_extension() -> String {
    "png".to_string()
}

fn default_image_keys() -> Vec<String> {
    vec![
        "image".to_string(),
        "image_url".to_string(),
        "imageURI".to_string(),
    ]
}

fn default_rewrite_parallelism() -> usize {
    16
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
