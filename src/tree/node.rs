//! In-memory node types shared by the loader, builder, and packager.

use crate::proto::NodeProperties;
use crate::upload::UploadEntry;
use std::collections::HashMap;

/// What sits at one path of the flat map.
#[derive(Debug, Clone)]
pub(crate) enum FsNode {
    File {
        entry: UploadEntry,
        is_executable: bool,
    },
    /// Target is stored in the form it will appear in the wire descriptor,
    /// relative to the link's directory.
    Symlink { target: String },
    /// A directory exists here with no children.
    EmptyDirectory,
}

/// A flat-map value: the node plus any properties attached to its remote
/// relative path.
#[derive(Debug, Clone)]
pub(crate) struct FileSysNode {
    pub node: FsNode,
    pub properties: Option<NodeProperties>,
}

/// Intermediate nested directory, folded from the flat map before packaging.
/// The root node represents the exec root itself.
#[derive(Debug, Default)]
pub(crate) struct TreeNode {
    pub leaves: HashMap<String, FileSysNode>,
    pub children: HashMap<String, TreeNode>,
}
