//! Per-`(action, path)` time-window suppression (§4.3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// The action a throttle entry is keyed on, alongside the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// An `add` event for a file.
    Add,
    /// An `addDir` event for a directory.
    AddDir,
    /// A `change` event. Not actually throttled here per §4.3, kept for completeness
    /// of the action enum so callers don't need a separate "untracked" path.
    Change,
    /// An `unlink`/`unlinkDir` removal.
    Unlink,
    /// A directory rescan.
    Readdir,
    /// A file-watch notification.
    Watch,
}

#[derive(Debug)]
struct Entry {
    deadline: Instant,
    suppressed: bool,
}

/// The ledger of active throttle windows.
///
/// A call to `throttle` either opens a new window and returns a handle, or (while a
/// window is already open for that key) records that further work arrived and
/// returns `None`. The handle's `clear` reports whether any such arrival happened,
/// so the caller can decide to re-run once more after the window closes.
#[derive(Debug, Default)]
pub struct Throttler {
    ledger: HashMap<(Action, PathBuf), Entry>,
}

/// A handle to an open throttle window. Must be cleared (typically once the
/// corresponding work has actually completed) to allow the window to close.
pub struct ThrottleHandle<'a> {
    throttler: &'a mut Throttler,
    key: (Action, PathBuf),
}

impl Throttler {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to open a throttle window for `(action, path)`.
    ///
    /// Returns `None` if a window is already open (and records the attempt so a
    /// later `clear()` reports `true`); otherwise opens a window of length `window`
    /// and returns a handle.
    pub fn throttle(&mut self, action: Action, path: &std::path::Path, window: Duration) -> Option<ThrottleHandle<'_>> {
        let key = (action, path.to_path_buf());
        let now = Instant::now();

        if let Some(entry) = self.ledger.get_mut(&key) {
            if entry.deadline > now {
                entry.suppressed = true;
                return None;
            }
        }

        self.ledger.insert(
            key.clone(),
            Entry {
                deadline: now + window,
                suppressed: false,
            },
        );
        Some(ThrottleHandle {
            throttler: self,
            key,
        })
    }

    /// Clears the ledger entry for `(action, path)` by key, reporting whether
    /// any call to `throttle` for it was suppressed while the window was open.
    ///
    /// Unlike [`ThrottleHandle::clear`], this does not require holding onto the
    /// handle returned by the `throttle` call that opened the window — it can be
    /// called later, from a different borrow of the same `Throttler`, once the
    /// window has actually elapsed (the delayed §4.6 step 5 re-run, driven by a
    /// timer rather than the same call stack that opened the window).
    pub fn clear_window(&mut self, action: Action, path: &std::path::Path) -> bool {
        self.ledger
            .remove(&(action, path.to_path_buf()))
            .map(|e| e.suppressed)
            .unwrap_or(false)
    }
}

impl ThrottleHandle<'_> {
    /// Closes the window, removing the ledger entry and reporting whether any call
    /// to `throttle` for the same key was suppressed while the window was open.
    pub fn clear(self) -> bool {
        self.throttler
            .ledger
            .remove(&self.key)
            .map(|e| e.suppressed)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::thread::sleep;

    #[test]
    fn first_call_opens_a_window() {
        let mut t = Throttler::new();
        let handle = t.throttle(Action::Readdir, Path::new("/a"), Duration::from_millis(50));
        assert!(handle.is_some());
    }

    #[test]
    fn concurrent_call_is_suppressed_and_reported() {
        let mut t = Throttler::new();
        let handle = t
            .throttle(Action::Readdir, Path::new("/a"), Duration::from_millis(200))
            .unwrap();
        assert!(t
            .throttle(Action::Readdir, Path::new("/a"), Duration::from_millis(200))
            .is_none());
        assert!(handle.clear());
    }

    #[test]
    fn clear_without_suppression_reports_false() {
        let mut t = Throttler::new();
        let handle = t
            .throttle(Action::Add, Path::new("/a"), Duration::from_millis(0))
            .unwrap();
        assert!(!handle.clear());
    }

    #[test]
    fn window_reopens_after_expiry() {
        let mut t = Throttler::new();
        let handle = t
            .throttle(Action::Watch, Path::new("/a"), Duration::from_millis(5))
            .unwrap();
        assert!(!handle.clear());
        sleep(Duration::from_millis(10));
        assert!(t
            .throttle(Action::Watch, Path::new("/a"), Duration::from_millis(5))
            .is_some());
    }

    #[test]
    fn distinct_actions_on_same_path_are_independent() {
        let mut t = Throttler::new();
        let _h1 = t
            .throttle(Action::Add, Path::new("/a"), Duration::from_millis(100))
            .unwrap();
        assert!(t
            .throttle(Action::AddDir, Path::new("/a"), Duration::from_millis(100))
            .is_some());
    }

    #[test]
    fn clear_window_reports_suppression_without_holding_the_handle() {
        let mut t = Throttler::new();
        assert!(t
            .throttle(Action::Readdir, Path::new("/a"), Duration::from_millis(200))
            .is_some());
        assert!(t
            .throttle(Action::Readdir, Path::new("/a"), Duration::from_millis(200))
            .is_none());
        assert!(t.clear_window(Action::Readdir, Path::new("/a")));
        assert!(!t.clear_window(Action::Readdir, Path::new("/a")));
    }
}
