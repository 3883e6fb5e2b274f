//! The `WatchedDir` data model (§3) and the per-facade store that owns them.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The set of basenames currently tracked beneath one directory, plus the raw
/// snapshot taken on the last rescan.
///
/// Invariant (§3): for every emitted `add`/`addDir` on child `C` under `D`,
/// `C` is present here until a matching `unlink`/`unlinkDir`.
#[derive(Debug, Default, Clone)]
pub struct WatchedDir {
    children: HashMap<OsString, bool>,
}

impl WatchedDir {
    /// Creates an empty tracked directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `basename` as a tracked child, remembering whether it is itself
    /// a directory so a later removal can be reported as `unlink` vs `unlinkDir`.
    pub fn add(&mut self, basename: impl Into<OsString>, is_dir: bool) {
        self.children.insert(basename.into(), is_dir);
    }

    /// Removes `basename` from the tracked set, returning whether it was a
    /// directory if it was present.
    pub fn remove(&mut self, basename: &std::ffi::OsStr) -> Option<bool> {
        self.children.remove(basename)
    }

    /// Whether `basename` is currently tracked.
    pub fn has(&self, basename: &std::ffi::OsStr) -> bool {
        self.children.contains_key(basename)
    }

    /// Iterates over tracked `(basename, is_dir)` pairs.
    pub fn children(&self) -> impl Iterator<Item = (&OsString, bool)> {
        self.children.iter().map(|(k, v)| (k, *v))
    }

    /// Number of tracked children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether no children are tracked.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// The per-facade table mapping an absolute directory path to its [`WatchedDir`].
///
/// This is the concrete form of the `_getWatchedDir` collaborator (§6): in the
/// source system it is owned by the outer facade and handed to the core by
/// reference; here the facade (`FsWatcher`) owns one of these directly.
#[derive(Debug, Default)]
pub struct WatchedDirStore {
    dirs: HashMap<PathBuf, WatchedDir>,
}

impl WatchedDirStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `WatchedDir` for `dir`, creating an empty one if absent.
    pub fn get_or_create(&mut self, dir: &Path) -> &mut WatchedDir {
        self.dirs.entry(dir.to_path_buf()).or_default()
    }

    /// Returns the `WatchedDir` for `dir`, if tracked.
    pub fn get(&self, dir: &Path) -> Option<&WatchedDir> {
        self.dirs.get(dir)
    }

    /// Whether `dir` is currently tracked at all (regardless of whether it has
    /// children).
    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains_key(dir)
    }

    /// Drops the entry for `dir` entirely (used once a directory itself is
    /// removed).
    pub fn forget(&mut self, dir: &Path) {
        self.dirs.remove(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_query() {
        let mut d = WatchedDir::new();
        d.add("a", false);
        assert!(d.has(std::ffi::OsStr::new("a")));
        assert!(!d.has(std::ffi::OsStr::new("b")));
    }

    #[test]
    fn remove_reports_presence_and_kind() {
        let mut d = WatchedDir::new();
        d.add("a", true);
        assert_eq!(d.remove(std::ffi::OsStr::new("a")), Some(true));
        assert_eq!(d.remove(std::ffi::OsStr::new("a")), None);
    }

    #[test]
    fn store_creates_lazily() {
        let mut store = WatchedDirStore::new();
        assert!(!store.contains(Path::new("/t")));
        store.get_or_create(Path::new("/t")).add("x", false);
        assert!(store.contains(Path::new("/t")));
        assert!(store
            .get(Path::new("/t"))
            .unwrap()
            .has(std::ffi::OsStr::new("x")));
    }
}
