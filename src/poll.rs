//! Polling-based watch primitive (§4.2), used when the event-driven backend is
//! unavailable or explicitly requested via `Options::with_use_polling`.
//!
//! Unlike the old thread-per-`Watcher`-instance design this module used to hold,
//! each watched path here gets its own background thread that stats on a fixed
//! interval and reports the `(previous, current)` pair to a shared dispatch
//! closure — this crate's analogue of `notify-debouncer-full`'s single watcher
//! thread locking a shared `Mutex<DebounceDataInner>` on every tick.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::event::Stats;

/// One polling observation: the path's current stat snapshot, and the previous
/// one if this is not the first tick.
#[derive(Debug, Clone)]
pub struct PollTick {
    /// The absolute path observed.
    pub path: PathBuf,
    /// `Some` when the path exists; `None` signals it has disappeared.
    pub current: Option<Stats>,
    /// The previous snapshot, if any.
    pub previous: Option<Stats>,
}

type Dispatch = Arc<dyn Fn(PollTick) + Send + Sync>;

struct PollingWatchEntry {
    subscriber_count: usize,
    interval: Duration,
    persistent: bool,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Reference-counted table of active stat-polling loops, keyed by absolute path.
///
/// Mirrors [`crate::native::NativeWatchRegistry`]'s subscribe/unsubscribe shape,
/// plus the upgrade rule from §4.2: a second subscriber asking for a shorter
/// interval (or for `persistent`) on an already-polled path restarts the loop
/// with the stronger of the two settings rather than running two loops.
pub struct PollingWatchRegistry {
    dispatch: Dispatch,
    entries: HashMap<PathBuf, PollingWatchEntry>,
}

impl PollingWatchRegistry {
    /// Builds a registry that reports every tick to `dispatch`.
    pub fn new<F>(dispatch: F) -> Self
    where
        F: Fn(PollTick) + Send + Sync + 'static,
    {
        Self {
            dispatch: Arc::new(dispatch),
            entries: HashMap::new(),
        }
    }

    /// Adds a logical subscriber for `abs_path`, polling every `interval`.
    ///
    /// If a loop is already running for this path, it is restarted only when
    /// `interval` is strictly shorter than the running one, or `persistent` is
    /// being upgraded from `false` to `true`; either way, the subscriber count is
    /// always bumped.
    pub fn subscribe(&mut self, abs_path: &Path, interval: Duration, persistent: bool) {
        if let Some(entry) = self.entries.get_mut(abs_path) {
            entry.subscriber_count += 1;
            let needs_upgrade = interval < entry.interval || (persistent && !entry.persistent);
            if !needs_upgrade {
                return;
            }
            let subscriber_count = entry.subscriber_count;
            let strongest_interval = interval.min(entry.interval);
            let strongest_persistent = persistent || entry.persistent;
            self.stop_entry(abs_path);
            self.spawn(abs_path, strongest_interval, strongest_persistent, subscriber_count);
            return;
        }

        self.spawn(abs_path, interval, persistent, 1);
    }

    fn spawn(&mut self, abs_path: &Path, interval: Duration, persistent: bool, subscriber_count: usize) {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = spawn_poll_loop(abs_path.to_path_buf(), interval, stop.clone(), self.dispatch.clone());
        self.entries.insert(
            abs_path.to_path_buf(),
            PollingWatchEntry {
                subscriber_count,
                interval,
                persistent,
                stop,
                thread: Some(thread),
            },
        );
    }

    fn stop_entry(&mut self, abs_path: &Path) {
        if let Some(mut entry) = self.entries.remove(abs_path) {
            entry.stop.store(true, Ordering::SeqCst);
            if let Some(handle) = entry.thread.take() {
                let _ = handle.join();
            }
        }
    }

    /// Removes one logical subscriber for `abs_path`, tearing down its poll loop
    /// once the last subscriber leaves.
    pub fn unsubscribe(&mut self, abs_path: &Path) {
        let done = match self.entries.get_mut(abs_path) {
            Some(entry) => {
                entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
                entry.subscriber_count == 0
            }
            None => return,
        };
        if done {
            self.stop_entry(abs_path);
        }
    }

    /// Whether `abs_path` currently has an active poll loop.
    pub fn is_watching(&self, abs_path: &Path) -> bool {
        self.entries.contains_key(abs_path)
    }
}

impl Drop for PollingWatchRegistry {
    fn drop(&mut self) {
        let paths: Vec<PathBuf> = self.entries.keys().cloned().collect();
        for path in paths {
            self.stop_entry(&path);
        }
    }
}

fn spawn_poll_loop(
    path: PathBuf,
    interval: Duration,
    stop: Arc<AtomicBool>,
    dispatch: Dispatch,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("notify-reconciler-poll-{}", path.display()))
        .spawn(move || {
            let mut previous: Option<Stats> = None;
            while !stop.load(Ordering::SeqCst) {
                let current = std::fs::symlink_metadata(&path)
                    .ok()
                    .map(|m| Stats::from_metadata(&m));
                if current != previous {
                    dispatch(PollTick {
                        path: path.clone(),
                        current,
                        previous,
                    });
                }
                previous = current;
                std::thread::sleep(interval);
            }
        })
        .expect("failed to spawn polling thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn reports_initial_observation_and_teardown_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut registry = PollingWatchRegistry::new(move |tick: PollTick| {
            let _ = tx.send(tick);
        });
        registry.subscribe(&file, Duration::from_millis(10), true);

        let tick = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(tick.path, file);
        assert!(tick.current.is_some());

        registry.unsubscribe(&file);
        assert!(!registry.is_watching(&file));
    }

    #[test]
    fn upgrading_interval_restarts_with_the_stronger_setting() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();

        let mut registry = PollingWatchRegistry::new(|_: PollTick| {});
        registry.subscribe(&file, Duration::from_secs(60), false);
        registry.subscribe(&file, Duration::from_millis(10), true);
        assert!(registry.is_watching(&file));
        registry.unsubscribe(&file);
        registry.unsubscribe(&file);
        assert!(!registry.is_watching(&file));
    }
}
