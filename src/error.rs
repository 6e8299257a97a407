//! Error types for pepe-pin
//!
//! Errors fall into two groups:
//! - Per-resource / per-record failures ([`FetchError`], [`PublishError::MalformedRecord`]) that
//!   callers count and log without aborting the batch
//! - Phase-level failures (setup, [`Error::ExternalTool`], [`PublishError::CidParse`]) that stop
//!   the current stage

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pepe-pin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pepe-pin
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.max_concurrency")
        key: Option<String>,
    },

    /// Fetch-stage error for a single resource
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Publish-stage error
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Insufficient disk space under the data root
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Minimum number of free bytes required
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// External tool execution failed (ipfs)
    #[error("external tool error: {message}")]
    ExternalTool {
        /// What went wrong (spawn failure, exit status)
        message: String,
        /// Captured stdout and stderr of the process, for diagnosis
        output: String,
    },

    /// Operation interrupted by the user
    #[error("interrupted by user")]
    Interrupted,
}

/// Errors for a single fetch of one remote resource
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request failed at the transport level (timeout, reset, refused)
    #[error("transfer of {url} failed: {source}")]
    Transfer {
        /// The URL being fetched
        url: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The body was received but could not be persisted
    #[error("failed to write {path}: {source}")]
    Write {
        /// The destination that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Publish-stage errors (content addressing and metadata rewriting)
#[derive(Debug, Error)]
pub enum PublishError {
    /// The collaborator's acknowledgment did not contain a CID for the top-level path
    #[error("could not parse CID for {path} from ipfs output")]
    CidParse {
        /// The top-level path that was added
        path: String,
        /// The captured output that failed to parse
        output: String,
    },

    /// A token that is not a usable content identifier
    #[error("invalid CID {0:?}")]
    InvalidCid(String),

    /// A required local store directory does not exist
    #[error("required folder {path} not found; run the download first")]
    MissingStore {
        /// The directory that was expected
        path: PathBuf,
    },

    /// A metadata record is not a well-formed JSON object
    #[error("{path} is not valid JSON: {reason}")]
    MalformedRecord {
        /// The source record
        path: PathBuf,
        /// Parser message
        reason: String,
    },
}

impl Error {
    /// Build a configuration error for `key`
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Returns true for transport failures that a later rerun may not hit again
    ///
    /// These are the failures the download coordinator isolates per task.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(e) | Error::Fetch(FetchError::Transfer { source: e, .. }) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            Error::Io(e) | Error::Fetch(FetchError::Write { source: e, .. }) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Publish(_)
            | Error::Serialization(_)
            | Error::InsufficientSpace { .. }
            | Error::ExternalTool { .. }
            | Error::Interrupted => false,
        }
    }
}
