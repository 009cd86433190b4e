//! Scratch file guards
//!
//! Uploads and served outputs are deleted when their guard drops, whether
//! the request succeeded or not.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Deletes its file on drop
///
/// A file that is already gone is fine; any other deletion failure is logged
/// and swallowed.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Guard the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the guarded file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// A request's scratch files, all deleted together
#[derive(Debug, Default)]
pub struct ScratchSet {
    files: Vec<ScratchFile>,
}

impl ScratchSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard another file
    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.files.push(ScratchFile::new(path));
    }

    /// Guarded paths, in insertion order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(ScratchFile::path)
    }

    /// Number of guarded files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set guards nothing
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scratch_file_deleted_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.png");
        std::fs::write(&path, b"data").unwrap();

        {
            let guard = ScratchFile::new(&path);
            assert_eq!(guard.path(), path);
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = TempDir::new().unwrap();
        drop(ScratchFile::new(dir.path().join("never-written")));
    }

    #[test]
    fn test_scratch_set_deletes_all_on_early_return() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        fn failing_step(set: &mut ScratchSet, a: &Path, b: &Path) -> Result<(), String> {
            set.push(a);
            set.push(b);
            Err("extraction failed".to_string())
        }

        let result = {
            let mut set = ScratchSet::new();
            let result = failing_step(&mut set, &a, &b);
            assert_eq!(set.len(), 2);
            assert_eq!(set.paths().collect::<Vec<_>>(), vec![a.as_path(), b.as_path()]);
            result
        };

        assert!(result.is_err());
        assert!(!a.exists());
        assert!(!b.exists());
    }
}
