//! `FileWatcher` (§4.5): per-file state and the stat-diff logic that turns a
//! native or polling notification into a `change`/`unlink` event.

use std::path::Path;

use crate::event::{Event, EventHandler, Stats};

/// State kept for one watched file: just the last stat snapshot, used only to
/// distinguish "never observed before" (emit `add`) from "already tracked"
/// (emit `change`) and "now gone" (emit `unlink`) — not to suppress a
/// notification whose stats happen to match the last one (§4.5 step 3 emits
/// `change` for every notification on an already-tracked file).
#[derive(Debug, Default, Clone, Copy)]
pub struct FileWatcherState {
    last_stats: Option<Stats>,
}

impl FileWatcherState {
    /// Creates state for a file whose initial stat is `initial`.
    pub fn new(initial: Option<Stats>) -> Self {
        Self {
            last_stats: initial,
        }
    }

    /// Feeds a fresh observation for this file, emitting the appropriate event
    /// through `handler`.
    ///
    /// `current` is `None` when the path no longer exists. Per §4.5 step 3, a
    /// notification carrying valid stats for an already-tracked file emits
    /// `change` unconditionally — `change` is explicitly not throttled on
    /// stat-equality (§4.3 only throttles the 5 ms `watch` window upstream of
    /// this call), since a rewrite with identical size and second-resolution
    /// mtime (the common case for a quick successive edit) would otherwise be
    /// silently dropped. Returns `true` if this observation caused an `unlink`
    /// (the caller should drop this state).
    pub fn observe(&mut self, path: &Path, current: Option<Stats>, handler: &mut dyn EventHandler) -> bool {
        match (self.last_stats, current) {
            (None, Some(stats)) => {
                handler.handle_event(Event::Add(path.to_path_buf(), stats));
                self.last_stats = Some(stats);
                false
            }
            (Some(_), Some(stats)) => {
                handler.handle_event(Event::Change(path.to_path_buf(), stats));
                self.last_stats = Some(stats);
                false
            }
            (Some(_), None) => {
                handler.handle_event(Event::Unlink(path.to_path_buf()));
                self.last_stats = None;
                true
            }
            (None, None) => false,
        }
    }
}
