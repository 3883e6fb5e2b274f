//! Minimal non-recursive directory reader collaborator (ambient glue: the
//! recursive walk itself belongs to `DirWatcher`; this module is the one-level
//! `read_dir` primitive it calls at each level).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A single entry observed during a one-level directory read.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The entry's absolute path.
    pub path: PathBuf,
    /// Whether the entry is a directory (after symlink resolution, per `metadata`).
    pub is_dir: bool,
    /// Whether the entry itself is a symlink (`symlink_metadata`, unresolved).
    pub is_symlink: bool,
}

/// Reads the immediate children of `dir`, sorted by basename for deterministic
/// diffing against a previous scan.
pub fn read_one_level(dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let read_dir = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    for item in read_dir {
        let item = item.map_err(|e| Error::io(dir, e))?;
        let path = item.path();
        let symlink_meta = fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;
        let is_symlink = symlink_meta.file_type().is_symlink();
        let is_dir = if is_symlink {
            fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false)
        } else {
            symlink_meta.is_dir()
        };
        entries.push(Entry {
            path,
            is_dir,
            is_symlink,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let entries = read_one_level(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.path.ends_with("a.txt") && !e.is_dir));
        assert!(entries.iter().any(|e| e.path.ends_with("sub") && e.is_dir));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = read_one_level(Path::new("/does/not/exist/hopefully")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
