//! Breadth-first loader: classifies each input path and populates the flat
//! map of remote-relative path to filesystem node.

use crate::command::{InputExclusion, InputType};
use crate::error::TreeError;
use crate::metadata::FileMetadataCache;
use crate::proto::NodeProperties;
use crate::tree::exclusion::should_exclude;
use crate::tree::node::{FileSysNode, FsNode};
use crate::tree::path::{clean, exec_root_rel_paths, target_rel_paths};
use crate::tree::TreeSymlinkOpts;
use crate::upload::UploadEntry;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::trace;

/// Replaces each parent element of `rel_path` with its target if it is a
/// symlink, resolving via the metadata cache.
///
/// Returns the evaluated path and the list of parent symlinks encountered,
/// all relative to `exec_root` but not necessarily descendants of it. The
/// returned path is not necessarily lexically normalized. The basename of
/// `rel_path` is never resolved; it remains the last component verbatim.
///
/// Example: exec_root=/a, rel_path=b/c/d/e.go with b -> bb yields
/// (bb/c/d/e.go, [b]).
pub(crate) fn eval_parent_symlinks(
    exec_root: &Path,
    rel_path: &Path,
    materialize_outside_exec_root: bool,
    cache: &dyn FileMetadataCache,
) -> Result<(PathBuf, Vec<PathBuf>), TreeError> {
    let mut symlinks = Vec::new();
    let mut evaled = String::new();
    // Tracks the absolute location of the evaluated target so far. It is
    // what relative symlink targets are relative to; a materialized path may
    // belong to a different tree, which makes it unusable for that.
    let mut target_path = exec_root.to_path_buf();

    let comps: Vec<String> = rel_path
        .iter()
        .map(|c| c.to_string_lossy().into_owned())
        .collect();
    if comps.is_empty() {
        return Ok((PathBuf::new(), symlinks));
    }
    let last_index = comps.len() - 1;
    for (i, comp) in comps.iter().enumerate() {
        if i != 0 {
            evaled.push(MAIN_SEPARATOR);
        }
        if i == last_index {
            // Do not resolve the basename.
            evaled.push_str(comp);
            break;
        }

        let rel_p = PathBuf::from(format!("{evaled}{comp}"));
        let abs_p = clean(&exec_root.join(&rel_p));
        let meta = cache.get(&abs_p);
        let Some(symlink) = meta.symlink else {
            evaled.push_str(comp);
            target_path.push(comp);
            continue;
        };

        // An absolute target replaces the accumulated location outright.
        target_path.push(&symlink.target);

        match target_rel_paths(exec_root, &rel_p, &target_path) {
            Ok((_, target_rel_symlink_dir)) => {
                evaled.push_str(&target_rel_symlink_dir.to_string_lossy());
                symlinks.push(rel_p);
            }
            Err(err) => {
                if materialize_outside_exec_root {
                    // Keep the original component; the escaping link will be
                    // materialized as a regular entry downstream.
                    evaled.push_str(comp);
                    continue;
                }
                return Err(err);
            }
        }
    }
    Ok((PathBuf::from(evaled), symlinks))
}

/// Reads all files named by `inputs` (descending into directories breadth
/// first) and loads them into `fs_nodes`, keyed by remote-relative path.
#[allow(clippy::too_many_arguments)]
pub(crate) fn load_files(
    exec_root: &Path,
    working_dir: &Path,
    remote_working_dir: &Path,
    exclusions: &[InputExclusion],
    inputs: &[String],
    fs_nodes: &mut HashMap<PathBuf, FileSysNode>,
    cache: &dyn FileMetadataCache,
    opts: TreeSymlinkOpts,
    node_properties: &HashMap<String, NodeProperties>,
) -> Result<(), TreeError> {
    let mut queue: VecDeque<PathBuf> = inputs.iter().map(PathBuf::from).collect();

    // Ancestor symlinks are enqueued once each. The flag flips to false when
    // the path is also named as an explicit input, so its target gets
    // followed on that later turn.
    let mut seen_ancestors: HashMap<PathBuf, bool> = HashMap::new();

    while let Some(path) = queue.pop_front() {
        if path.as_os_str().is_empty() {
            return Err(TreeError::EmptyInput { origin: "input" });
        }

        let abs_path = if opts.preserved {
            let (evaled, parent_symlinks) = eval_parent_symlinks(
                exec_root,
                &path,
                opts.materialize_outside_exec_root,
                cache,
            )?;
            trace!(
                path = %path.display(),
                evaled = %evaled.display(),
                parent_symlinks = parent_symlinks.len(),
                "evaluated parent symlinks"
            );
            for p in parent_symlinks {
                if seen_ancestors.contains_key(&p) {
                    continue;
                }
                seen_ancestors.insert(p.clone(), true);
                queue.push_back(p);
            }
            clean(&exec_root.join(evaled))
        } else {
            clean(&exec_root.join(&path))
        };

        let (norm_path, remote_norm_path) =
            exec_root_rel_paths(&abs_path, exec_root, working_dir, remote_working_dir)?;
        let properties = node_properties
            .get(remote_norm_path.to_string_lossy().as_ref())
            .cloned();
        let meta = cache.get(&abs_path);

        if let Some(symlink) = meta.symlink.clone() {
            if symlink.is_dangling && !opts.preserved {
                // A dangling symlink that would have to be converted into a
                // file is silently left out of the finalized tree.
                continue;
            }
            if opts.preserved {
                if should_exclude(&abs_path, InputType::Symlink, exclusions) {
                    continue;
                }
                match target_rel_paths(exec_root, &norm_path, &symlink.target) {
                    Ok((target_exec_root, target_symlink_dir)) => {
                        // The raw target may be absolute; the remote worker
                        // maps the exec root elsewhere, so the stored target
                        // must be relative to the link's directory.
                        fs_nodes.insert(
                            remote_norm_path,
                            FileSysNode {
                                node: FsNode::Symlink {
                                    target: target_symlink_dir.to_string_lossy().into_owned(),
                                },
                                properties,
                            },
                        );

                        let mut follows_target = opts.follows_target;
                        if seen_ancestors.get(&norm_path).copied().unwrap_or(false) {
                            // Only an ancestor so far, not an explicit input;
                            // following would pull in the target's entire
                            // subtree. Clear the mark so an explicit
                            // occurrence later still follows.
                            follows_target = false;
                            seen_ancestors.insert(norm_path.clone(), false);
                        }

                        if !symlink.is_dangling && follows_target {
                            queue.push_back(target_exec_root);
                        }
                        continue;
                    }
                    Err(err) => {
                        // Target outside the exec root.
                        if !opts.materialize_outside_exec_root {
                            return Err(TreeError::SymlinkEscapesExecRoot {
                                path: norm_path,
                                exec_root: exec_root.to_path_buf(),
                                source: Box::new(err),
                            });
                        }
                        if symlink.is_dangling {
                            return Err(TreeError::DanglingMaterializeTarget {
                                path: norm_path,
                                target: symlink.target,
                            });
                        }
                        // Fall through and materialize the linked file.
                    }
                }
            }
        }

        if meta.is_directory {
            if should_exclude(&abs_path, InputType::Directory, exclusions) {
                continue;
            }
            if let Some(err) = meta.err {
                return Err(TreeError::Metadata {
                    path: abs_path,
                    source: err,
                });
            }

            let mut children = Vec::new();
            for entry in std::fs::read_dir(&abs_path)? {
                children.push(entry?.file_name());
            }
            if children.is_empty() {
                // The exec root itself is never recorded as an empty dir.
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
            for child in children {
                queue.push_back(norm_path.join(child));
            }
        } else {
            if should_exclude(&abs_path, InputType::File, exclusions) {
                continue;
            }
            if let Some(err) = meta.err {
                return Err(TreeError::Metadata {
                    path: abs_path,
                    source: err,
                });
            }

            fs_nodes.insert(
                remote_norm_path,
                FileSysNode {
                    node: FsNode::File {
                        entry: UploadEntry::from_file(meta.digest.clone(), abs_path.clone()),
                        is_executable: meta.is_executable,
                    },
                    properties,
                },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::InputExclusion;
    use crate::digest::Digest;
    use crate::metadata::StatCache;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn load(
        root: &Path,
        inputs: &[&str],
        opts: TreeSymlinkOpts,
        exclusions: &[InputExclusion],
    ) -> Result<HashMap<PathBuf, FileSysNode>, TreeError> {
        let mut fs_nodes = HashMap::new();
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        load_files(
            root,
            Path::new(""),
            Path::new(""),
            exclusions,
            &inputs,
            &mut fs_nodes,
            &StatCache::new(),
            opts,
            &HashMap::new(),
        )?;
        Ok(fs_nodes)
    }

    #[test]
    fn test_loads_files_and_descends() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "bye").unwrap();

        let nodes = load(dir.path(), &["."], TreeSymlinkOpts::default(), &[]).unwrap();
        assert_eq!(nodes.len(), 2);
        match &nodes[&PathBuf::from("a.txt")].node {
            FsNode::File { entry, .. } => assert_eq!(entry.digest, Digest::of_bytes(b"hi")),
            other => panic!("unexpected node {other:?}"),
        }
        assert!(nodes.contains_key(&PathBuf::from("sub/b.txt")));
    }

    #[test]
    fn test_empty_input_fails() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path(), &[""], TreeSymlinkOpts::default(), &[]).unwrap_err();
        assert!(matches!(err, TreeError::EmptyInput { .. }));
    }

    #[test]
    fn test_empty_directory_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let nodes = load(dir.path(), &["empty"], TreeSymlinkOpts::default(), &[]).unwrap();
        assert!(matches!(
            nodes[&PathBuf::from("empty")].node,
            FsNode::EmptyDirectory
        ));
    }

    #[test]
    fn test_empty_exec_root_yields_no_marker() {
        let dir = TempDir::new().unwrap();
        let nodes = load(dir.path(), &["."], TreeSymlinkOpts::default(), &[]).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_dangling_symlink_dropped_under_resolve() {
        let dir = TempDir::new().unwrap();
        symlink("nowhere", dir.path().join("link")).unwrap();

        let nodes = load(dir.path(), &["link"], TreeSymlinkOpts::default(), &[]).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_resolved_symlink_becomes_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("target.txt"), "x").unwrap();
        symlink("target.txt", dir.path().join("link")).unwrap();

        let nodes = load(dir.path(), &["link"], TreeSymlinkOpts::default(), &[]).unwrap();
        assert!(matches!(
            nodes[&PathBuf::from("link")].node,
            FsNode::File { .. }
        ));
    }

    #[test]
    fn test_preserved_symlink_and_followed_target() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("target.txt"), "x").unwrap();
        symlink("target.txt", dir.path().join("link")).unwrap();

        let opts = TreeSymlinkOpts {
            preserved: true,
            ..Default::default()
        };
        let nodes = load(dir.path(), &["link"], opts, &[]).unwrap();
        match &nodes[&PathBuf::from("link")].node {
            FsNode::Symlink { target } => assert_eq!(target, "target.txt"),
            other => panic!("unexpected node {other:?}"),
        }
        assert!(nodes.contains_key(&PathBuf::from("target.txt")));
    }

    #[test]
    fn test_preserved_symlink_without_follow() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("target.txt"), "x").unwrap();
        symlink("target.txt", dir.path().join("link")).unwrap();

        let opts = TreeSymlinkOpts {
            preserved: true,
            follows_target: false,
            ..Default::default()
        };
        let nodes = load(dir.path(), &["link"], opts, &[]).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes.contains_key(&PathBuf::from("link")));
    }

    #[test]
    fn test_ancestor_symlink_does_not_pull_in_siblings() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("realdir")).unwrap();
        std::fs::write(dir.path().join("realdir/x.txt"), "x").unwrap();
        std::fs::write(dir.path().join("realdir/y.txt"), "y").unwrap();
        symlink("realdir", dir.path().join("a")).unwrap();

        let opts = TreeSymlinkOpts {
            preserved: true,
            ..Default::default()
        };
        let nodes = load(dir.path(), &["a/x.txt"], opts, &[]).unwrap();
        match &nodes[&PathBuf::from("a")].node {
            FsNode::Symlink { target } => assert_eq!(target, "realdir"),
            other => panic!("unexpected node {other:?}"),
        }
        assert!(nodes.contains_key(&PathBuf::from("realdir/x.txt")));
        assert!(!nodes.contains_key(&PathBuf::from("realdir/y.txt")));
    }

    #[test]
    fn test_explicit_input_clears_ancestor_mark() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("realdir")).unwrap();
        std::fs::write(dir.path().join("realdir/x.txt"), "x").unwrap();
        std::fs::write(dir.path().join("realdir/y.txt"), "y").unwrap();
        symlink("realdir", dir.path().join("a")).unwrap();

        let opts = TreeSymlinkOpts {
            preserved: true,
            ..Default::default()
        };
        // Named both through an ancestor path and explicitly: the explicit
        // occurrence follows the target and brings in the whole directory.
        let nodes = load(dir.path(), &["a/x.txt", "a"], opts, &[]).unwrap();
        assert!(nodes.contains_key(&PathBuf::from("realdir/x.txt")));
        assert!(nodes.contains_key(&PathBuf::from("realdir/y.txt")));
    }

    #[test]
    fn test_symlink_escaping_exec_root_fails() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("outside.txt"), "o").unwrap();
        symlink("../outside.txt", root.join("link")).unwrap();

        let opts = TreeSymlinkOpts {
            preserved: true,
            ..Default::default()
        };
        let err = load(&root, &["link"], opts, &[]).unwrap_err();
        assert!(matches!(err, TreeError::SymlinkEscapesExecRoot { .. }));
    }

    #[test]
    fn test_escaping_symlink_materialized_when_enabled() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("outside.txt"), "o").unwrap();
        symlink("../outside.txt", root.join("link")).unwrap();

        let opts = TreeSymlinkOpts {
            preserved: true,
            materialize_outside_exec_root: true,
            ..Default::default()
        };
        let nodes = load(&root, &["link"], opts, &[]).unwrap();
        match &nodes[&PathBuf::from("link")].node {
            FsNode::File { entry, .. } => assert_eq!(entry.digest, Digest::of_bytes(b"o")),
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_escaping_dangling_symlink_fails_materialization() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        symlink("../nowhere", root.join("link")).unwrap();

        let opts = TreeSymlinkOpts {
            preserved: true,
            materialize_outside_exec_root: true,
            ..Default::default()
        };
        let err = load(&root, &["link"], opts, &[]).unwrap_err();
        assert!(matches!(err, TreeError::DanglingMaterializeTarget { .. }));
    }

    #[test]
    fn test_exclusions_drop_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "k").unwrap();
        std::fs::write(dir.path().join("drop.o"), "d").unwrap();

        let exclusions = vec![InputExclusion {
            regex: r"\.o$".to_string(),
            input_type: InputType::File,
        }];
        let nodes = load(dir.path(), &["."], TreeSymlinkOpts::default(), &exclusions).unwrap();
        assert!(nodes.contains_key(&PathBuf::from("keep.txt")));
        assert!(!nodes.contains_key(&PathBuf::from("drop.o")));
    }

    #[test]
    fn test_eval_parent_symlinks_resolves_parents_only() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("realdir")).unwrap();
        std::fs::write(dir.path().join("realdir/x.txt"), "x").unwrap();
        symlink("realdir", dir.path().join("a")).unwrap();

        let cache = StatCache::new();
        let (evaled, symlinks) =
            eval_parent_symlinks(dir.path(), Path::new("a/x.txt"), false, &cache).unwrap();
        assert_eq!(evaled, PathBuf::from("realdir/x.txt"));
        assert_eq!(symlinks, vec![PathBuf::from("a")]);
    }

    #[test]
    fn test_eval_parent_symlinks_basename_untouched() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("target.txt"), "x").unwrap();
        symlink("target.txt", dir.path().join("link")).unwrap();

        let cache = StatCache::new();
        let (evaled, symlinks) =
            eval_parent_symlinks(dir.path(), Path::new("link"), false, &cache).unwrap();
        assert_eq!(evaled, PathBuf::from("link"));
        assert!(symlinks.is_empty());
    }
}
