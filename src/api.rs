//! Public tree operations
//!
//! [`TreeClient`] carries caller-level symlink options and exposes the three
//! operations of the core: computing the Merkle tree of an input spec,
//! flattening a serialized tree, and packaging produced outputs.

use crate::command::{InputSpec, SymlinkBehavior};
use crate::digest::Digest;
use crate::error::TreeError;
use crate::metadata::FileMetadataCache;
use crate::outputs;
use crate::proto;
use crate::tree::builder::build_tree;
use crate::tree::flattener::{self, TreeOutput};
use crate::tree::loader::load_files;
use crate::tree::node::{FileSysNode, FsNode};
use crate::tree::packager::package_tree;
use crate::tree::path::{clean, exec_root_rel_paths};
use crate::tree::{TreeStats, TreeSymlinkOpts};
use crate::upload::UploadEntry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Stateless facade over the tree pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeClient {
    /// Caller-level symlink handling, merged with each invocation's
    /// [`SymlinkBehavior`].
    pub symlink_opts: Option<TreeSymlinkOpts>,
}

impl TreeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symlink_opts(opts: TreeSymlinkOpts) -> Self {
        Self {
            symlink_opts: Some(opts),
        }
    }

    /// Packages an input spec into a Merkle tree, returning the root digest,
    /// the deduplicated upload entries realizing the tree, and build stats.
    ///
    /// Virtual inputs are inserted before the filesystem walk, so an on-disk
    /// entry at the same remote path overrides its virtual counterpart.
    #[instrument(skip(self, spec, cache), fields(exec_root = %exec_root.display()))]
    pub fn compute_merkle_tree(
        &self,
        exec_root: &Path,
        working_dir: &Path,
        remote_working_dir: &Path,
        spec: &InputSpec,
        cache: &dyn FileMetadataCache,
    ) -> Result<(Digest, Vec<UploadEntry>, TreeStats), TreeError> {
        let mut stats = TreeStats::default();
        let mut fs_nodes: HashMap<PathBuf, FileSysNode> = HashMap::new();

        for virtual_input in &spec.virtual_inputs {
            if virtual_input.path.is_empty() {
                return Err(TreeError::EmptyInput {
                    origin: "virtual input",
                });
            }
            let abs_path = clean(&exec_root.join(&virtual_input.path));
            let (norm_path, remote_norm_path) =
                exec_root_rel_paths(&abs_path, exec_root, working_dir, remote_working_dir)?;
            let properties = spec
                .input_node_properties
                .get(remote_norm_path.to_string_lossy().as_ref())
                .cloned();
            if virtual_input.is_empty_directory {
                if norm_path.as_path() != Path::new(".") {
                    fs_nodes.insert(
                        remote_norm_path,
                        FileSysNode {
                            node: FsNode::EmptyDirectory,
                            properties,
                        },
                    );
                }
                continue;
            }
            fs_nodes.insert(
                remote_norm_path,
                FileSysNode {
                    node: FsNode::File {
                        entry: UploadEntry::from_blob(virtual_input.contents.clone()),
                        is_executable: virtual_input.is_executable,
                    },
                    properties,
                },
            );
        }

        load_files(
            exec_root,
            working_dir,
            remote_working_dir,
            &spec.input_exclusions,
            &spec.inputs,
            &mut fs_nodes,
            cache,
            TreeSymlinkOpts::from_behavior(self.symlink_opts, spec.symlink_behavior),
            &spec.input_node_properties,
        )?;

        let file_tree = build_tree(fs_nodes);
        let (root, blobs) = package_tree(&file_tree, &mut stats, Path::new(""))?;
        debug!(
            root = %root,
            input_files = stats.input_files,
            input_directories = stats.input_directories,
            input_symlinks = stats.input_symlinks,
            total_input_bytes = stats.total_input_bytes,
            "computed merkle tree"
        );
        Ok((root, blobs.into_values().collect(), stats))
    }

    /// Calculates the relative paths of all leaves of `tree` against
    /// `root_path`. Only files, symlinks, and empty directories are
    /// returned, never intermediate directories.
    pub fn flatten_tree(
        &self,
        tree: &proto::Tree,
        root_path: &Path,
    ) -> Result<HashMap<PathBuf, TreeOutput>, TreeError> {
        flattener::flatten_tree(tree, root_path)
    }

    /// Transforms produced output paths (relative to the working directory)
    /// into uploadable entries, packaging output directories as trees, and
    /// populates the action result. Missing outputs are skipped.
    #[instrument(skip(self, paths, cache, node_properties), fields(exec_root = %exec_root.display()))]
    pub fn compute_outputs_to_upload(
        &self,
        exec_root: &Path,
        working_dir: &Path,
        paths: &[String],
        cache: &dyn FileMetadataCache,
        behavior: SymlinkBehavior,
        node_properties: &HashMap<String, proto::NodeProperties>,
    ) -> Result<(HashMap<Digest, UploadEntry>, proto::ActionResult), TreeError> {
        outputs::compute_outputs_to_upload(
            exec_root,
            working_dir,
            paths,
            cache,
            TreeSymlinkOpts::from_behavior(self.symlink_opts, behavior),
            node_properties,
        )
    }
}
