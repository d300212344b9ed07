//! Packages the nested tree into canonical directory descriptors.
//!
//! Each directory's digest commits to the digests of all its descendants, so
//! the digest returned for the root is a Merkle root over the entire tree.

use crate::digest::Digest;
use crate::error::TreeError;
use crate::proto;
use crate::tree::node::{FsNode, TreeNode};
use crate::tree::TreeStats;
use crate::upload::UploadEntry;
use std::collections::HashMap;
use std::path::Path;
use tracing::trace;

/// Post-order packaging of `node`: returns the directory's digest and every
/// blob beneath it, deduplicated by digest. `prefix` is the accumulated
/// remote path, used only for tracing.
pub(crate) fn package_tree(
    node: &TreeNode,
    stats: &mut TreeStats,
    prefix: &Path,
) -> Result<(Digest, HashMap<Digest, UploadEntry>), TreeError> {
    let mut dir = proto::Directory::default();
    let mut blobs = HashMap::new();

    for (name, child) in &node.children {
        let path = prefix.join(name);
        let (child_digest, child_blobs) = package_tree(child, stats, &path)?;
        dir.directories.push(proto::DirectoryNode {
            name: name.clone(),
            digest: Some(child_digest.to_proto()),
        });
        blobs.extend(child_blobs);
    }
    // Map iteration order is arbitrary; the explicit sort is what makes the
    // descriptor, and therefore the digest, deterministic.
    dir.directories.sort_by(|a, b| a.name.cmp(&b.name));

    for (name, leaf) in &node.leaves {
        match &leaf.node {
            FsNode::File {
                entry,
                is_executable,
            } => {
                let digest = entry.digest.clone();
                dir.files.push(proto::FileNode {
                    name: name.clone(),
                    digest: Some(digest.to_proto()),
                    is_executable: *is_executable,
                    node_properties: leaf.properties.clone(),
                });
                stats.input_files += 1;
                stats.total_input_bytes += digest.size_bytes;
                blobs.insert(digest, entry.clone());
            }
            FsNode::Symlink { target } => {
                dir.symlinks.push(proto::SymlinkNode {
                    name: name.clone(),
                    target: target.clone(),
                    node_properties: leaf.properties.clone(),
                });
                stats.input_symlinks += 1;
            }
            // Already represented as an empty child by the builder.
            FsNode::EmptyDirectory => {}
        }
    }
    dir.files.sort_by(|a, b| a.name.cmp(&b.name));
    dir.symlinks.sort_by(|a, b| a.name.cmp(&b.name));

    let entry = UploadEntry::from_proto(&dir)?;
    let digest = entry.digest.clone();
    trace!(path = %prefix.display(), digest = %digest, "packaged directory");
    blobs.insert(digest.clone(), entry);
    stats.total_input_bytes += digest.size_bytes;
    stats.input_directories += 1;
    Ok((digest, blobs))
}

/// Output-side packaging: like [`package_tree`] but additionally produces a
/// [`proto::Tree`] listing every descendant descriptor. The returned tree has
/// no root attached; the caller sets it after registering the root blob.
/// Child descriptors are appended in ascending name order, each immediately
/// followed by its own descendants, so the list holds every descendant
/// exactly once.
pub(crate) fn package_directories(
    node: &TreeNode,
) -> Result<(proto::Directory, HashMap<Digest, UploadEntry>, proto::Tree), TreeError> {
    let mut root = proto::Directory::default();
    let mut files = HashMap::new();
    let mut tree = proto::Tree::default();

    let mut child_names: Vec<&String> = node.children.keys().collect();
    child_names.sort();

    for name in child_names {
        let child = &node.children[name];
        let (child_root, child_files, child_tree) = package_directories(child)?;
        let child_digest = Digest::of_message(&child_root)?;
        root.directories.push(proto::DirectoryNode {
            name: name.clone(),
            digest: Some(child_digest.to_proto()),
        });
        files.extend(child_files);
        tree.children.push(child_root);
        tree.children.extend(child_tree.children);
    }
    root.directories.sort_by(|a, b| a.name.cmp(&b.name));

    for (name, leaf) in &node.leaves {
        match &leaf.node {
            FsNode::File {
                entry,
                is_executable,
            } => {
                let digest = entry.digest.clone();
                root.files.push(proto::FileNode {
                    name: name.clone(),
                    digest: Some(digest.to_proto()),
                    is_executable: *is_executable,
                    node_properties: leaf.properties.clone(),
                });
                files.insert(digest, entry.clone());
            }
            FsNode::Symlink { target } => {
                root.symlinks.push(proto::SymlinkNode {
                    name: name.clone(),
                    target: target.clone(),
                    node_properties: leaf.properties.clone(),
                });
            }
            FsNode::EmptyDirectory => {}
        }
    }
    root.files.sort_by(|a, b| a.name.cmp(&b.name));
    root.symlinks.sort_by(|a, b| a.name.cmp(&b.name));

    Ok((root, files, tree))
}
