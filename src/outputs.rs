//! Packages produced outputs after remote execution: files become digest
//! entries on the action result, directories become whole subtrees rooted at
//! their own path.

use crate::digest::Digest;
use crate::error::TreeError;
use crate::metadata::FileMetadataCache;
use crate::proto;
use crate::tree::builder::build_tree;
use crate::tree::loader::load_files;
use crate::tree::packager::package_directories;
use crate::tree::path::{clean, rel, rel_under};
use crate::tree::TreeSymlinkOpts;
use crate::upload::UploadEntry;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Transforms produced output paths (relative to the working directory) into
/// uploadable entries and populates the action result. Paths reported absent
/// by the cache are skipped; other metadata errors abort.
pub(crate) fn compute_outputs_to_upload(
    exec_root: &Path,
    working_dir: &Path,
    paths: &[String],
    cache: &dyn FileMetadataCache,
    opts: TreeSymlinkOpts,
    node_properties: &HashMap<String, proto::NodeProperties>,
) -> Result<(HashMap<Digest, UploadEntry>, proto::ActionResult), TreeError> {
    let mut outs: HashMap<Digest, UploadEntry> = HashMap::new();
    let mut result = proto::ActionResult::default();
    let wd_abs = clean(&exec_root.join(working_dir));

    for path in paths {
        let abs_path = clean(&wd_abs.join(path));
        rel_under(exec_root, &abs_path)?;

        let meta = cache.get(&abs_path);
        if let Some(err) = meta.err {
            if err.is_not_found {
                debug!(path = %abs_path.display(), "skipping missing output");
                continue;
            }
            return Err(TreeError::Metadata {
                path: abs_path,
                source: err,
            });
        }
        let norm_path = rel(&wd_abs, &abs_path)?;

        if !meta.is_directory {
            let entry = UploadEntry::from_file(meta.digest.clone(), abs_path.clone());
            outs.insert(meta.digest.clone(), entry);
            result.output_files.push(proto::OutputFile {
                path: norm_path.to_string_lossy().into_owned(),
                digest: Some(meta.digest.to_proto()),
                is_executable: meta.is_executable,
                node_properties: node_properties
                    .get(norm_path.to_string_lossy().as_ref())
                    .cloned(),
            });
            continue;
        }

        // A directory: load it as a fresh subtree rooted at itself, then
        // package both the root descriptor and the whole-tree message.
        let mut fs_nodes = HashMap::new();
        load_files(
            &abs_path,
            Path::new(""),
            Path::new(""),
            &[],
            &[".".to_string()],
            &mut fs_nodes,
            cache,
            opts,
            node_properties,
        )?;
        let file_tree = build_tree(fs_nodes);
        let (root_dir, files, mut tree) = package_directories(&file_tree)?;

        let root_entry = UploadEntry::from_proto(&root_dir)?;
        outs.insert(root_entry.digest.clone(), root_entry);

        tree.root = Some(root_dir);
        let tree_entry = UploadEntry::from_proto(&tree)?;
        let tree_digest = tree_entry.digest.clone();
        outs.insert(tree_digest.clone(), tree_entry);

        for (digest, entry) in files {
            outs.insert(digest, entry);
        }
        result.output_directories.push(proto::OutputDirectory {
            path: norm_path.to_string_lossy().into_owned(),
            tree_digest: Some(tree_digest.to_proto()),
        });

        // Each child descriptor is also uploadable on its own.
        if let Some(root) = &tree.root {
            let entry = UploadEntry::from_proto(root)?;
            outs.insert(entry.digest.clone(), entry);
        }
        for child in &tree.children {
            let entry = UploadEntry::from_proto(child)?;
            outs.insert(entry.digest.clone(), entry);
        }
    }
    Ok((outs, result))
}
