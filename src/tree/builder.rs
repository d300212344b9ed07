//! Folds the flat path map into a nested directory tree.

use crate::tree::node::{FileSysNode, FsNode, TreeNode};
use std::collections::HashMap;
use std::path::PathBuf;

/// Build the nested tree from the loader's flat map. Intermediate
/// directories are created on demand; creating one that already exists is a
/// no-op. Never touches the filesystem.
pub(crate) fn build_tree(files: HashMap<PathBuf, FileSysNode>) -> TreeNode {
    let mut root = TreeNode::default();
    for (path, fs_node) in files {
        let mut segments: Vec<String> = path
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect();
        let Some(base) = segments.pop() else {
            continue;
        };

        let mut node = &mut root;
        for segment in segments {
            node = node.children.entry(segment).or_default();
        }

        match fs_node.node {
            FsNode::EmptyDirectory => {
                node.children.entry(base).or_default();
            }
            _ => {
                node.leaves.insert(base, fs_node);
            }
        }
    }
    root
}
