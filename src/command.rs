//! Input spec types: what a caller asks to have packaged into a tree.

use crate::proto::NodeProperties;
use bytes::Bytes;
use std::collections::HashMap;

/// Kind of input an exclusion rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputType {
    /// Matches every kind.
    #[default]
    Unspecified,
    File,
    Directory,
    Symlink,
}

/// How symlinks found among the inputs are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SymlinkBehavior {
    /// Defer to the caller-level options.
    #[default]
    Unspecified,
    /// Convert each symlink into its targeted file.
    Resolve,
    /// Keep symlinks as symlinks in the tree.
    Preserve,
}

/// Excludes inputs whose path matches `regex` and whose kind matches
/// `input_type`. A rule with [`InputType::Unspecified`] applies to all kinds.
#[derive(Debug, Clone, Default)]
pub struct InputExclusion {
    pub regex: String,
    pub input_type: InputType,
}

/// An input supplied as in-memory bytes (or as an empty-directory marker)
/// rather than read from disk.
#[derive(Debug, Clone, Default)]
pub struct VirtualInput {
    /// Exec-root-relative destination path.
    pub path: String,
    pub contents: Bytes,
    pub is_empty_directory: bool,
    pub is_executable: bool,
}

/// The full set of inputs for one tree build.
#[derive(Debug, Clone, Default)]
pub struct InputSpec {
    /// Paths relative to the exec root. Directories are descended into.
    pub inputs: Vec<String>,
    pub virtual_inputs: Vec<VirtualInput>,
    pub input_exclusions: Vec<InputExclusion>,
    /// Keyed by remote-working-dir-relative path.
    pub input_node_properties: HashMap<String, NodeProperties>,
    pub symlink_behavior: SymlinkBehavior,
}
