//! Content addressing through the external `ipfs` binary

use super::addresser::{AddOptions, ContentAddresser};
use super::parser::parse_add_output;
use crate::config::PublishConfig;
use crate::error::{Error, Result};
use crate::types::Cid;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Adds and pins folders by running `ipfs add`
///
/// Each call runs
/// `ipfs [--api <addr>] add -r --cid-version=<v> --pin=true [--ignore <pattern>]... <path>`
/// and reads the root CID from its output.
///
/// # Examples
///
/// ```no_run
/// use pepe_pin::publish::IpfsCliAddresser;
/// use std::path::PathBuf;
///
/// // Explicit binary
/// let ipfs = IpfsCliAddresser::new(PathBuf::from("/usr/local/bin/ipfs"));
///
/// // Or auto-discover from PATH
/// let ipfs = IpfsCliAddresser::from_path().expect("ipfs not found in PATH");
/// ```
#[derive(Clone, Debug)]
pub struct IpfsCliAddresser {
    binary_path: PathBuf,
    api: Option<String>,
    cid_version: u8,
}

impl IpfsCliAddresser {
    /// Create a new CLI addresser with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            api: None,
            cid_version: 1,
        }
    }

    /// Attempt to find `ipfs` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ipfs").ok().map(Self::new)
    }

    /// Build from configuration, falling back to PATH discovery
    pub fn from_config(config: &PublishConfig) -> Result<Self> {
        let base = match &config.ipfs_path {
            Some(path) => Self::new(path.clone()),
            None => Self::from_path().ok_or_else(|| {
                Error::config(
                    "publish.ipfs_path",
                    "ipfs binary not found in PATH; install kubo or set ipfs_path",
                )
            })?,
        };
        Ok(base
            .with_cid_version(config.cid_version)
            .with_api(config.ipfs_api.clone()))
    }

    /// Talk to the node at `api` instead of the CLI's default
    #[must_use]
    pub fn with_api(mut self, api: Option<String>) -> Self {
        self.api = api;
        self
    }

    /// CID version passed to `ipfs add`
    #[must_use]
    pub fn with_cid_version(mut self, version: u8) -> Self {
        self.cid_version = version;
        self
    }

    /// Path of the binary that will be run
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn add_args(&self, path: &Path, options: &AddOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(api) = &self.api {
            args.push("--api".into());
            args.push(api.into());
        }
        args.push("add".into());
        args.push("-r".into());
        args.push(format!("--cid-version={}", self.cid_version).into());
        args.push("--pin=true".into());
        for pattern in &options.exclude {
            args.push("--ignore".into());
            args.push(pattern.into());
        }
        args.push(path.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl ContentAddresser for IpfsCliAddresser {
    async fn add_and_pin(&self, path: &Path, options: &AddOptions) -> Result<Cid> {
        tracing::info!(
            path = %path.display(),
            exclude = ?options.exclude,
            "Adding folder to IPFS"
        );

        let output = Command::new(&self.binary_path)
            .args(self.add_args(path, options))
            .output()
            .await
            .map_err(|e| Error::ExternalTool {
                message: format!(
                    "Failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ),
                output: String::new(),
            })?;

        if !output.status.success() {
            return Err(Error::ExternalTool {
                message: format!("ipfs add {} exited with {}", path.display(), output.status),
                output: format!(
                    "{}\n{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        let cid = parse_add_output(&output.stdout, path)?;
        tracing::info!(path = %path.display(), cid = %cid, "Folder pinned");
        Ok(cid)
    }

    fn name(&self) -> &'static str {
        "ipfs-cli"
    }
}
