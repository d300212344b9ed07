//! Castree: Content-Addressed Input Trees for Remote Execution
//!
//! Packages a declarative input spec (filesystem paths, in-memory virtual
//! inputs, exclusion rules) into a Merkle tree of content-addressed directory
//! descriptors, returning the root digest and the deduplicated set of blobs
//! needed to realize the tree on a remote worker. Also provides the inverse
//! operation (flattening a serialized tree into a path to leaf map) and the
//! output-side packaging of produced files and directories after execution.

pub mod api;
pub mod command;
pub mod digest;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod proto;
pub mod tree;
pub mod upload;

mod outputs;

pub use api::TreeClient;
pub use digest::Digest;
pub use error::TreeError;
pub use tree::flattener::TreeOutput;
pub use tree::{TreeStats, TreeSymlinkOpts};
pub use upload::{UploadEntry, UploadSource};
