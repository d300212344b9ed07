//! Lexical path mapping between the exec root, working directories, and
//! symlink targets.
//!
//! Every function here is a pure function of its arguments: paths are
//! normalized and compared component-wise without ever touching the
//! filesystem. Containment checks reject any path whose normalized form
//! begins with an ascending component.

use crate::error::TreeError;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Lexically normalize a path: collapse `.` and `x/..` segments and repeated
/// separators. A relative path that ascends keeps its leading `..`
/// components; an absolute path cannot ascend past the root. The empty path
/// normalizes to `.`.
pub fn clean(path: &Path) -> PathBuf {
    let is_abs = path.is_absolute();
    let mut out: Vec<&OsStr> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(&last) if last != OsStr::new("..") => {
                    out.pop();
                }
                _ if is_abs => {}
                _ => out.push(OsStr::new("..")),
            },
            Component::Normal(c) => out.push(c),
        }
    }
    let mut cleaned = if is_abs {
        PathBuf::from("/")
    } else {
        PathBuf::new()
    };
    for c in out {
        cleaned.push(c);
    }
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

fn components(path: &Path) -> Vec<&OsStr> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            Component::ParentDir => Some(OsStr::new("..")),
            _ => None,
        })
        .collect()
}

/// Lexically compute `target` relative to `base`, so that
/// `clean(base.join(rel(base, target)))` equals `clean(target)`. Both paths
/// must be absolute or both relative. Fails when `base` ascends into unknown
/// territory that `target` does not share.
pub fn rel(base: &Path, target: &Path) -> Result<PathBuf, TreeError> {
    let base_clean = clean(base);
    let target_clean = clean(target);
    if base_clean.is_absolute() != target_clean.is_absolute() {
        return Err(TreeError::OutsidePath {
            path: target_clean,
            base: base_clean,
        });
    }
    if base_clean == target_clean {
        return Ok(PathBuf::from("."));
    }

    let b = components(&base_clean);
    let t = components(&target_clean);
    let common = b.iter().zip(t.iter()).take_while(|(x, y)| x == y).count();
    if b[common..].iter().any(|c| *c == OsStr::new("..")) {
        return Err(TreeError::OutsidePath {
            path: target_clean,
            base: base_clean,
        });
    }

    let mut out = PathBuf::new();
    for _ in common..b.len() {
        out.push("..");
    }
    for c in &t[common..] {
        out.push(c);
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    Ok(out)
}

/// `path` relative to `base`, required to stay inside `base`. Fails with
/// [`TreeError::OutsidePath`] when the relative form ascends.
pub fn rel_under(base: &Path, path: &Path) -> Result<PathBuf, TreeError> {
    let r = rel(base, path)?;
    if r.components().next() == Some(Component::ParentDir) {
        return Err(TreeError::OutsidePath {
            path: path.to_path_buf(),
            base: base.to_path_buf(),
        });
    }
    Ok(r)
}

/// Rewrite a local-working-dir-relative view of `path` into the remote
/// working directory. `path` and `working_dir` are both exec-root-relative.
pub fn remote_path(
    path: &Path,
    working_dir: &Path,
    remote_working_dir: &Path,
) -> Result<PathBuf, TreeError> {
    let wd_rel = rel(working_dir, path)?;
    Ok(clean(&remote_working_dir.join(wd_rel)))
}

/// Local and remote exec-root-relative paths for a local absolute path.
/// When `remote_working_dir` is empty or equal to `working_dir`, both forms
/// are identical.
pub fn exec_root_rel_paths(
    abs_path: &Path,
    exec_root: &Path,
    working_dir: &Path,
    remote_working_dir: &Path,
) -> Result<(PathBuf, PathBuf), TreeError> {
    let rel_path = rel_under(exec_root, abs_path)?;
    if remote_working_dir.as_os_str().is_empty() || remote_working_dir == working_dir {
        return Ok((rel_path.clone(), rel_path));
    }
    let remote_rel_path = remote_path(&rel_path, working_dir, remote_working_dir)?;
    trace!(
        abs_path = %abs_path.display(),
        rel_path = %rel_path.display(),
        remote_rel_path = %remote_rel_path.display(),
        "mapped exec root relative paths"
    );
    Ok((rel_path, remote_rel_path))
}

/// For a symlink at exec-root-relative `symlink_rel_path` pointing at
/// `target`, returns the target relative to the exec root and relative to
/// the symlink's directory (the form stored on the wire). `target` is either
/// absolute or relative to the symlink's directory. Fails with
/// [`TreeError::OutsidePath`] when the target is not a descendant of
/// `exec_root`.
pub fn target_rel_paths(
    exec_root: &Path,
    symlink_rel_path: &Path,
    target: &Path,
) -> Result<(PathBuf, PathBuf), TreeError> {
    let symlink_abs_dir = clean(
        &exec_root.join(symlink_rel_path.parent().unwrap_or_else(|| Path::new(""))),
    );
    let target_abs = if target.is_absolute() {
        clean(target)
    } else {
        clean(&symlink_abs_dir.join(target))
    };

    let rel_exec_root = rel_under(exec_root, &target_abs)?;
    let rel_symlink_dir = rel(&symlink_abs_dir, &target_abs)?;
    Ok((rel_exec_root, rel_symlink_dir))
}
