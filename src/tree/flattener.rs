//! Flattens a serialized tree back into a path to leaf map.

use crate::digest::Digest;
use crate::error::TreeError;
use crate::proto;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// A leaf of a flattened tree: a file, a symlink, or an empty directory.
/// Intermediate directories are not reported.
#[derive(Debug, Clone)]
pub struct TreeOutput {
    pub digest: Digest,
    pub path: PathBuf,
    pub is_executable: bool,
    pub is_empty_directory: bool,
    pub symlink_target: String,
    pub node_properties: Option<proto::NodeProperties>,
}

/// Calculates the paths of all leaves of `tree` relative to `root_path`.
/// Directories containing only other directories are omitted; an empty
/// directory is itself reported as a leaf carrying the empty digest.
pub fn flatten_tree(
    tree: &proto::Tree,
    root_path: &Path,
) -> Result<HashMap<PathBuf, TreeOutput>, TreeError> {
    let root = tree.root.clone().unwrap_or_default();
    let root_digest = Digest::of_message(&root)?;

    let mut dirs: HashMap<Digest, proto::Directory> = HashMap::new();
    dirs.insert(root_digest.clone(), root);
    for child in &tree.children {
        dirs.insert(Digest::of_message(child)?, child.clone());
    }

    let mut queue: VecDeque<(Digest, PathBuf)> = VecDeque::new();
    queue.push_back((root_digest, root_path.to_path_buf()));

    let mut flat_files = HashMap::new();
    while let Some((digest, path)) = queue.pop_front() {
        let Some(dir) = dirs.get(&digest) else {
            return Err(TreeError::MissingChild { path, digest });
        };

        if dir.files.is_empty() && dir.directories.is_empty() && dir.symlinks.is_empty() {
            flat_files.insert(
                path.clone(),
                TreeOutput {
                    digest: Digest::empty(),
                    path,
                    is_executable: false,
                    is_empty_directory: true,
                    symlink_target: String::new(),
                    node_properties: dir.node_properties.clone(),
                },
            );
            continue;
        }

        for file in &dir.files {
            let out_path = path.join(&file.name);
            flat_files.insert(
                out_path.clone(),
                TreeOutput {
                    digest: file
                        .digest
                        .as_ref()
                        .map(Digest::from_proto)
                        .unwrap_or_default(),
                    path: out_path,
                    is_executable: file.is_executable,
                    is_empty_directory: false,
                    symlink_target: String::new(),
                    node_properties: file.node_properties.clone(),
                },
            );
        }

        for symlink in &dir.symlinks {
            let out_path = path.join(&symlink.name);
            flat_files.insert(
                out_path.clone(),
                TreeOutput {
                    digest: Digest::default(),
                    path: out_path,
                    is_executable: false,
                    is_empty_directory: false,
                    symlink_target: symlink.target.clone(),
                    node_properties: symlink.node_properties.clone(),
                },
            );
        }

        for subdir in &dir.directories {
            let subdir_digest = subdir
                .digest
                .as_ref()
                .map(Digest::from_proto)
                .unwrap_or_default();
            queue.push_back((subdir_digest, path.join(&subdir.name)));
        }
    }
    Ok(flat_files)
}
