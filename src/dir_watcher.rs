//! `DirWatcher` (§4.6): directory-diff reconciliation.
//!
//! Given a fresh one-level directory listing, compares it against the tracked
//! [`WatchedDir`] to synthesize `add`/`addDir`/`unlink`/`unlinkDir` events, and
//! reports which new children the caller ([`crate::dispatcher`]) still needs to
//! recurse into.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::Options;
use crate::event::{Event, EventHandler, Stats};
use crate::readdir::{self, Entry};
use crate::watched_dir::WatchedDirStore;

/// A child discovered during reconciliation that the dispatcher should start
/// watching (and, if a directory, recurse into).
#[derive(Debug, Clone)]
pub struct Discovered {
    /// Absolute path of the new entry.
    pub path: PathBuf,
    /// Whether the entry is a directory (after symlink resolution).
    pub is_dir: bool,
    /// Whether the entry itself is a symlink — the caller must route this
    /// through symlink handling (cycle breaking / leaf tracking) rather than
    /// treating `is_dir` at face value.
    pub is_symlink: bool,
}

/// Reads `dir` and reconciles it against the store, emitting events through
/// `handler` for everything that changed since the last scan.
///
/// `suppress_events` corresponds to `Options::ignore_initial`: the very first
/// scan of a directory still populates the store (so later scans have a
/// baseline to diff against) but does not announce anything.
pub fn rescan(
    dir: &Path,
    store: &mut WatchedDirStore,
    options: &Options,
    suppress_events: bool,
    handler: &mut dyn EventHandler,
) -> crate::error::Result<Vec<Discovered>> {
    let entries = readdir::read_one_level(dir)?;
    let mut discovered = Vec::new();

    let previously_known: Vec<(OsString, bool)> = store
        .get(dir)
        .map(|wd| wd.children().map(|(name, is_dir)| (name.clone(), is_dir)).collect())
        .unwrap_or_default();

    let watched = store.get_or_create(dir);

    let mut seen = std::collections::HashSet::new();
    for entry in &entries {
        let Some(basename) = entry.path.file_name() else {
            continue;
        };
        seen.insert(basename.to_os_string());

        if options.is_ignored(&entry.path) {
            continue;
        }
        if entry.is_dir && !options.filter_dir(&entry.path) {
            continue;
        }
        if !entry.is_dir && !options.filter_path(&entry.path) {
            continue;
        }

        if watched.has(basename) {
            continue;
        }

        watched.add(basename, entry.is_dir);
        if !suppress_events {
            emit_addition(entry, handler);
        }
        discovered.push(Discovered {
            path: entry.path.clone(),
            is_dir: entry.is_dir,
            is_symlink: entry.is_symlink,
        });
    }

    for (basename, was_dir) in previously_known {
        if seen.contains(&basename) {
            continue;
        }
        watched.remove(&basename);
        let child_path = dir.join(&basename);
        if was_dir {
            store.forget(&child_path);
            handler.handle_event(Event::UnlinkDir(child_path));
        } else {
            handler.handle_event(Event::Unlink(child_path));
        }
    }

    Ok(discovered)
}

/// §4.3's `add=0`/`addDir=0` throttle windows are zero-length, so they never
/// actually suppress a call — the `watched.has(basename)` check the caller
/// already performs before calling this is the real dedup guard. No separate
/// `Throttler` entry is kept for these two actions.
fn emit_addition(entry: &Entry, handler: &mut dyn EventHandler) {
    let stats = std::fs::metadata(&entry.path)
        .map(|m| Stats::from_metadata(&m))
        .unwrap_or(Stats {
            size: 0,
            mtime: 0,
            is_dir: entry.is_dir,
        });
    if entry.is_dir {
        handler.handle_event(Event::AddDir(entry.path.clone(), stats));
    } else {
        handler.handle_event(Event::Add(entry.path.clone(), stats));
    }
}
