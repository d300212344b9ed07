//! Error types for tree construction, flattening, and output packaging.

use crate::digest::Digest;
use crate::metadata::FileError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the tree core. The first error encountered aborts the
/// build; no partial trees are returned.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("empty {origin} path, use \".\" for the entire exec root")]
    EmptyInput { origin: &'static str },

    #[error("path {path:?} is not under {base:?}")]
    OutsidePath { path: PathBuf, base: PathBuf },

    #[error("failed to determine the target of symlink {path:?} as a child of {exec_root:?}: {source}")]
    SymlinkEscapesExecRoot {
        path: PathBuf,
        exec_root: PathBuf,
        #[source]
        source: Box<TreeError>,
    },

    #[error("failed to materialize dangling symlink {path:?} with target {target:?}")]
    DanglingMaterializeTarget { path: PathBuf, target: PathBuf },

    #[error("metadata error for {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: FileError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't find directory {path:?} with digest {digest}")]
    MissingChild { path: PathBuf, digest: Digest },

    #[error("failed to serialize directory descriptor: {0}")]
    Serialization(#[from] prost::EncodeError),
}
