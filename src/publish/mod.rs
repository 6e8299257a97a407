//! Stage 2: publish the collection to IPFS.
//!
//! - [`addresser`] - the [`ContentAddresser`] capability
//! - [`ipfs`] - implementation backed by the `ipfs` CLI
//! - [`parser`] - reads root CIDs out of `ipfs add` output
//! - [`memory`] - in-memory implementation with canned answers
//! - [`MetadataRewriter`] - points each metadata record at the published images
//! - [`PublishCoordinator`] - sequences publish, rewrite, publish

pub mod addresser;
mod coordinator;
pub mod ipfs;
pub mod memory;
pub mod parser;
mod rewriter;

pub use addresser::{AddOptions, ContentAddresser};
pub use coordinator::PublishCoordinator;
pub use ipfs::IpfsCliAddresser;
pub use memory::{AddCall, CannedAddresser, CannedResponse};
pub use parser::parse_add_output;
pub use rewriter::MetadataRewriter;
