//! Input tree pipeline
//!
//! Turns an input spec into a Merkle tree in four stages: the loader walks
//! the filesystem into a flat path to node map, the builder folds that map
//! into a nested tree, the packager emits canonical directory descriptors and
//! collects upload blobs, and the flattener inverts a serialized tree back
//! into a path to leaf map.

pub(crate) mod builder;
pub mod exclusion;
pub mod flattener;
pub(crate) mod loader;
pub(crate) mod node;
pub(crate) mod packager;
pub mod path;

use crate::command::SymlinkBehavior;
use serde::{Deserialize, Serialize};

/// Controls how symlinks are handled when constructing a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSymlinkOpts {
    /// By default, a symlink is converted into its targeted file.
    /// If true, preserve the symlink.
    pub preserved: bool,
    /// If true, the symlink target (if not dangling) is followed.
    pub follows_target: bool,
    /// If true, overrides `preserved` for symlinks that point outside the
    /// exec root, converting them into their targeted files while preserving
    /// symlinks that point to files within the exec root. Has no effect if
    /// `preserved` is false, as all symlinks are materialized then.
    pub materialize_outside_exec_root: bool,
}

impl Default for TreeSymlinkOpts {
    fn default() -> Self {
        Self {
            preserved: false,
            follows_target: true,
            materialize_outside_exec_root: false,
        }
    }
}

impl TreeSymlinkOpts {
    /// Merge caller-level options with a per-invocation behavior. `Resolve`
    /// and `Preserve` override the `preserved` flag; `Unspecified` leaves the
    /// options as given.
    pub fn from_behavior(opts: Option<TreeSymlinkOpts>, behavior: SymlinkBehavior) -> Self {
        let mut opts = opts.unwrap_or_default();
        match behavior {
            SymlinkBehavior::Resolve => opts.preserved = false,
            SymlinkBehavior::Preserve => opts.preserved = true,
            SymlinkBehavior::Unspecified => {}
        }
        opts
    }
}

/// Stats of the constructed Merkle tree.
///
/// These count the overall input tree, even if some parts of it are not
/// unique. A file of 10 bytes occurring 5 times counts as 5 input files and
/// 50 total input bytes, while the blob set holds it once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub input_files: u64,
    pub input_directories: u64,
    pub input_symlinks: u64,
    pub total_input_bytes: i64,
}
