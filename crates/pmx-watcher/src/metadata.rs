//! Filesystem metadata queries.
//!
//! `watch` consults a [`Metadata`] implementation to check that a path exists
//! and to pick directory or file handling. [`RealMetadata`] asks the OS;
//! [`MemoryMetadata`] answers from a declared tree.

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use pmx_core::{FxHashSet, fx_hash_set};

/// Answers existence and directory queries for paths.
pub trait Metadata: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists.
    fn exists(&self, path: &Utf8Path) -> bool;

    /// Returns `true` if `path` exists and is a directory.
    fn is_dir(&self, path: &Utf8Path) -> bool;
}

/// Metadata backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealMetadata;

impl Metadata for RealMetadata {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }
}

/// Metadata answered from declared files and directories.
///
/// Declaring a path also declares every ancestor as a directory.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use pmx_watcher::{MemoryMetadata, Metadata};
///
/// let meta = MemoryMetadata::new();
/// meta.add_file("a/b/x.txt");
///
/// assert!(meta.is_dir(Utf8Path::new("a/b")));
/// assert!(meta.exists(Utf8Path::new("a/b/x.txt")));
/// assert!(!meta.is_dir(Utf8Path::new("a/b/x.txt")));
/// ```
#[derive(Debug, Default)]
pub struct MemoryMetadata {
    files: RwLock<FxHashSet<Utf8PathBuf>>,
    dirs: RwLock<FxHashSet<Utf8PathBuf>>,
}

impl MemoryMetadata {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: RwLock::new(fx_hash_set()),
            dirs: RwLock::new(fx_hash_set()),
        }
    }

    /// Declares a file and its ancestor directories.
    pub fn add_file(&self, path: impl Into<Utf8PathBuf>) {
        let path = path.into();
        self.add_ancestors(&path);
        self.files.write().insert(path);
    }

    /// Declares a directory and its ancestors.
    pub fn add_dir(&self, path: impl Into<Utf8PathBuf>) {
        let path = path.into();
        self.add_ancestors(&path);
        self.dirs.write().insert(path);
    }

    /// Forgets a declared file or directory. Ancestors are kept.
    pub fn remove(&self, path: &Utf8Path) {
        self.files.write().remove(path);
        self.dirs.write().remove(path);
    }

    fn add_ancestors(&self, path: &Utf8Path) {
        let mut dirs = self.dirs.write();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_owned());
        }
    }
}

impl Metadata for MemoryMetadata {
    fn exists(&self, path: &Utf8Path) -> bool {
        self.files.read().contains(path) || self.dirs.read().contains(path)
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        self.dirs.read().contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_memory_metadata_declares_ancestors() {
        let meta = MemoryMetadata::new();
        meta.add_file("a/b/x.txt");

        assert!(meta.exists(Utf8Path::new("a")));
        assert!(meta.is_dir(Utf8Path::new("a")));
        assert!(meta.is_dir(Utf8Path::new("a/b")));
        assert!(!meta.exists(Utf8Path::new("")));
        assert!(!meta.exists(Utf8Path::new("a/b/y.txt")));
    }

    #[test]
    fn test_memory_metadata_absolute_paths() {
        let meta = MemoryMetadata::new();
        meta.add_dir("/w/a");

        assert!(meta.is_dir(Utf8Path::new("/w")));
        assert!(meta.is_dir(Utf8Path::new("/")));
        assert!(meta.is_dir(Utf8Path::new("/w/a")));
    }

    #[test]
    fn test_memory_metadata_remove() {
        let meta = MemoryMetadata::new();
        meta.add_file("a/x.txt");
        meta.remove(Utf8Path::new("a/x.txt"));

        assert!(!meta.exists(Utf8Path::new("a/x.txt")));
        assert!(meta.is_dir(Utf8Path::new("a")));
    }

    #[test]
    fn test_real_metadata() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let file = dir.join("x.txt");
        fs::write(&file, "x").expect("Failed to write file");

        let meta = RealMetadata;
        assert!(meta.is_dir(dir));
        assert!(meta.exists(&file));
        assert!(!meta.is_dir(&file));
        assert!(!meta.exists(&dir.join("missing.txt")));
    }
}
