//! File metadata cache
//!
//! Answers "what is this path?" for the loader: digest and executable bit for
//! regular files, directory-ness, and symlink target plus dangling state.
//! [`StatCache`] is the stat-backed implementation; it memoizes lookups and
//! is safe to share across concurrent tree builds.

use crate::digest::Digest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error reported by a metadata lookup.
///
/// `is_not_found` lets the output packager distinguish absent outputs (which
/// are silently skipped) from hard errors.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FileError {
    pub is_not_found: bool,
    pub message: String,
}

impl FileError {
    fn from_io(err: &std::io::Error) -> Self {
        Self {
            is_not_found: err.kind() == std::io::ErrorKind::NotFound,
            message: err.to_string(),
        }
    }
}

/// Symlink portion of a metadata record.
#[derive(Debug, Clone)]
pub struct SymlinkMetadata {
    /// Raw link target, exactly as stored in the link.
    pub target: PathBuf,
    /// True when the target does not exist at lookup time.
    pub is_dangling: bool,
}

/// Everything the tree core needs to know about one absolute path.
///
/// For a symlink pointing at a directory, both `symlink` and `is_directory`
/// are set; the symlink attribute takes precedence in the loader.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Content digest. Meaningful for regular files (and symlink targets that
    /// are regular files); the empty digest otherwise.
    pub digest: Digest,
    pub is_executable: bool,
    pub is_directory: bool,
    pub symlink: Option<SymlinkMetadata>,
    pub err: Option<FileError>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            digest: Digest::empty(),
            is_executable: false,
            is_directory: false,
            symlink: None,
            err: None,
        }
    }
}

/// Source of metadata records, keyed by absolute path.
///
/// Implementations must be safe for concurrent reads; they may memoize.
pub trait FileMetadataCache: Send + Sync {
    fn get(&self, abs_path: &Path) -> Metadata;
}

/// Memoizing, stat-backed metadata cache.
///
/// The first lookup of a path stats (and for regular files, reads and hashes)
/// it; later lookups return the memoized record even if the file has changed
/// since.
#[derive(Default)]
pub struct StatCache {
    entries: Mutex<HashMap<PathBuf, Metadata>>,
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute(path: &Path) -> Metadata {
        let lstat = match std::fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) => {
                return Metadata {
                    err: Some(FileError::from_io(&e)),
                    ..Default::default()
                }
            }
        };

        if lstat.file_type().is_symlink() {
            let target = match std::fs::read_link(path) {
                Ok(t) => t,
                Err(e) => {
                    return Metadata {
                        err: Some(FileError::from_io(&e)),
                        ..Default::default()
                    }
                }
            };
            // Follow the link. A failed stat here means the link dangles.
            return match std::fs::metadata(path) {
                Ok(followed) => {
                    let mut meta = if followed.is_dir() {
                        Metadata {
                            is_directory: true,
                            ..Default::default()
                        }
                    } else {
                        Self::file_metadata(path, &followed)
                    };
                    meta.symlink = Some(SymlinkMetadata {
                        target,
                        is_dangling: false,
                    });
                    meta
                }
                Err(_) => Metadata {
                    symlink: Some(SymlinkMetadata {
                        target,
                        is_dangling: true,
                    }),
                    ..Default::default()
                },
            };
        }

        if lstat.is_dir() {
            return Metadata {
                is_directory: true,
                ..Default::default()
            };
        }

        Self::file_metadata(path, &lstat)
    }

    fn file_metadata(path: &Path, stat: &std::fs::Metadata) -> Metadata {
        let contents = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) => {
                return Metadata {
                    err: Some(FileError::from_io(&e)),
                    ..Default::default()
                }
            }
        };
        Metadata {
            digest: Digest::of_bytes(&contents),
            is_executable: stat.permissions().mode() & 0o111 != 0,
            ..Default::default()
        }
    }
}

impl FileMetadataCache for StatCache {
    fn get(&self, abs_path: &Path) -> Metadata {
        let mut entries = self.entries.lock();
        if let Some(meta) = entries.get(abs_path) {
            return meta.clone();
        }
        let meta = Self::compute(abs_path);
        entries.insert(abs_path.to_path_buf(), meta.clone());
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "hello").unwrap();

        let cache = StatCache::new();
        let meta = cache.get(&path);
        assert!(meta.err.is_none());
        assert!(!meta.is_directory);
        assert!(meta.symlink.is_none());
        assert_eq!(meta.digest, Digest::of_bytes(b"hello"));
    }

    #[test]
    fn test_executable_bit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();

        let meta = StatCache::new().get(&path);
        assert!(meta.is_executable);
    }

    #[test]
    fn test_directory() {
        let dir = TempDir::new().unwrap();
        let meta = StatCache::new().get(dir.path());
        assert!(meta.is_directory);
        assert!(meta.err.is_none());
    }

    #[test]
    fn test_symlink_to_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("target.txt"), "x").unwrap();
        let link = dir.path().join("link");
        symlink("target.txt", &link).unwrap();

        let meta = StatCache::new().get(&link);
        let sym = meta.symlink.expect("symlink metadata");
        assert_eq!(sym.target, PathBuf::from("target.txt"));
        assert!(!sym.is_dangling);
        assert_eq!(meta.digest, Digest::of_bytes(b"x"));
    }

    #[test]
    fn test_symlink_to_directory_sets_both() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let link = dir.path().join("link");
        symlink("sub", &link).unwrap();

        let meta = StatCache::new().get(&link);
        assert!(meta.is_directory);
        assert!(meta.symlink.is_some());
    }

    #[test]
    fn test_dangling_symlink() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("link");
        symlink("nowhere", &link).unwrap();

        let meta = StatCache::new().get(&link);
        let sym = meta.symlink.expect("symlink metadata");
        assert!(sym.is_dangling);
        assert_eq!(sym.target, PathBuf::from("nowhere"));
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let meta = StatCache::new().get(&dir.path().join("absent"));
        assert!(meta.err.expect("error").is_not_found);
    }

    #[test]
    fn test_memoizes_first_lookup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "before").unwrap();

        let cache = StatCache::new();
        let first = cache.get(&path);
        std::fs::write(&path, "after").unwrap();
        let second = cache.get(&path);
        assert_eq!(first.digest, second.digest);
    }
}
