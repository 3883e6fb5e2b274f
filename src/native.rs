//! Multiplexing of logical subscribers onto the event-driven OS primitive (§4.1).
//!
//! The underlying primitive is `notify::RecommendedWatcher`, which already
//! multiplexes many watched paths onto a single native handle (one inotify fd,
//! one FSEvents stream, ...). This registry's job is the layer the spec asks for
//! on top of that: reference-counted `watch`/`unwatch` calls so N logical
//! subscribers on the same path only register once, and the `unusable` latch that
//! stops us from touching a path's watch again after the backend reported it fatal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct NativeWatchEntry {
    subscriber_count: usize,
    /// Set once the backend reports a fatal error for this path. While set, the
    /// registry will not call `unwatch` for it again: per §3/§9, closing a watch
    /// handle that already errored is not guaranteed safe across every backend,
    /// so this implementation preserves the source's choice to leak rather than
    /// risk it.
    unusable: bool,
}

/// Reference-counted table of active event-driven watches, keyed by absolute path.
pub struct NativeWatchRegistry {
    watcher: RecommendedWatcher,
    entries: HashMap<PathBuf, NativeWatchEntry>,
}

impl NativeWatchRegistry {
    /// Builds a registry backed by a single shared [`notify::RecommendedWatcher`],
    /// whose events are delivered to `event_handler`.
    pub fn new<F>(event_handler: F) -> Result<Self>
    where
        F: notify::EventHandler,
    {
        let watcher = RecommendedWatcher::new(event_handler, notify::Config::default())?;
        Ok(Self {
            watcher,
            entries: HashMap::new(),
        })
    }

    /// Adds a logical subscriber for `abs_path`. Opens the native watch on the
    /// first subscriber; subsequent subscribers just bump the reference count.
    pub fn subscribe(&mut self, abs_path: &Path) -> Result<()> {
        if let Some(entry) = self.entries.get_mut(abs_path) {
            entry.subscriber_count += 1;
            return Ok(());
        }

        self.watcher.watch(abs_path, RecursiveMode::NonRecursive)?;
        self.entries.insert(
            abs_path.to_path_buf(),
            NativeWatchEntry {
                subscriber_count: 1,
                unusable: false,
            },
        );
        log::trace!("native watch opened for {}", abs_path.display());
        Ok(())
    }

    /// Removes one logical subscriber for `abs_path`. When the count reaches
    /// zero, the native watch is closed (unless the entry was marked unusable).
    pub fn unsubscribe(&mut self, abs_path: &Path) {
        let Some(entry) = self.entries.get_mut(abs_path) else {
            return;
        };
        entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        if entry.subscriber_count > 0 {
            return;
        }

        let unusable = entry.unusable;
        self.entries.remove(abs_path);
        if unusable {
            log::debug!(
                "leaving unusable native watch for {} in place",
                abs_path.display()
            );
            return;
        }
        if let Err(err) = self.watcher.unwatch(abs_path) {
            log::debug!("unwatch({}) failed: {err}", abs_path.display());
        }
    }

    /// Marks `abs_path`'s entry as unusable, per the Windows `EPERM` handling and
    /// the general "any other native error" disposition in §7.
    pub fn mark_unusable(&mut self, abs_path: &Path) {
        if let Some(entry) = self.entries.get_mut(abs_path) {
            entry.unusable = true;
        }
    }
}

impl std::fmt::Debug for NativeWatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeWatchRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Translates a `notify::Event` into the abstract `{kind, entry_path}` pair
/// described in §6's OS primitive contract.
pub fn classify_raw(event: &notify::Event) -> crate::event::RawKind {
    use notify::event::{EventKind, ModifyKind};
    match event.kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            crate::event::RawKind::Rename
        }
        _ => crate::event::RawKind::Change,
    }
}

/// Returns `Ok(true)` if a probe open-then-close of `path` succeeds, per the
/// Windows `EPERM` recovery procedure in §4.1/§7.
pub fn probe_reopen(path: &Path) -> Result<bool> {
    match std::fs::File::open(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(Error::io(path, err)),
    }
}

/// Whether a `notify::Error` is the Windows-specific permission-denied quirk
/// the EPERM recovery procedure in §4.1/§7 is meant to handle.
pub fn is_permission_denied(err: &notify::Error) -> bool {
    matches!(&err.kind, notify::ErrorKind::Io(io_err) if io_err.kind() == std::io::ErrorKind::PermissionDenied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcounting_does_not_double_unwatch() {
        // Smoke test: a registry with no subscribers never panics on unsubscribe.
        let mut registry = NativeWatchRegistry::new(|_: notify::Result<notify::Event>| {}).unwrap();
        registry.unsubscribe(Path::new("/does/not/exist"));
    }
}
