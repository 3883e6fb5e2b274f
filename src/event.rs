//! The outbound event surface (§6 of the design).

use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Stats snapshot attached to `add`/`addDir`/`change` events.
///
/// A thin, serializable slice of [`std::fs::Metadata`] rather than the metadata
/// itself, which does not implement `Clone`/`PartialEq`/`serde` on every platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats {
    /// File size in bytes; `0` for directories.
    pub size: u64,
    /// Modification time as nanoseconds since `UNIX_EPOCH`, or `0` if unavailable.
    ///
    /// Whole-second resolution is not enough to tell apart two writes that land
    /// in the same wall-clock second with the same resulting size (the S1
    /// scenario: rewriting a file to another value of identical length) — the
    /// nanosecond precision `SystemTime` already carries is kept instead of
    /// truncating to `as_secs()`.
    pub mtime: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl Stats {
    /// Builds a [`Stats`] snapshot from real filesystem metadata.
    pub fn from_metadata(meta: &Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            size: meta.len(),
            mtime,
            is_dir: meta.is_dir(),
        }
    }
}

/// The kind of raw notification relayed verbatim through [`Event::Raw`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RawKind {
    /// A rename, creation, or deletion affecting the watched path or an entry under it.
    Rename,
    /// A content or metadata change.
    Change,
}

/// A single de-duplicated, normalized change event.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Event {
    /// A new file was observed.
    Add(PathBuf, Stats),
    /// A new directory was observed.
    AddDir(PathBuf, Stats),
    /// An existing file's content or metadata changed.
    Change(PathBuf, Stats),
    /// A file was removed.
    Unlink(PathBuf),
    /// A directory was removed.
    UnlinkDir(PathBuf),
    /// All paths supplied before the first processing turn have been classified
    /// and their initial scans drained. Emitted at most once.
    Ready,
    /// A raw, unprocessed notification from the underlying backend.
    Raw {
        /// The kind of raw notification.
        kind: RawKind,
        /// Basename of the entry the notification concerns, relative to `watched_path`.
        entry_path: PathBuf,
        /// The absolute path that was being watched when the notification arrived.
        watched_path: PathBuf,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Add(p, _) => write!(f, "add {}", p.display()),
            Event::AddDir(p, _) => write!(f, "addDir {}", p.display()),
            Event::Change(p, _) => write!(f, "change {}", p.display()),
            Event::Unlink(p) => write!(f, "unlink {}", p.display()),
            Event::UnlinkDir(p) => write!(f, "unlinkDir {}", p.display()),
            Event::Ready => write!(f, "ready"),
            Event::Raw {
                kind, entry_path, ..
            } => write!(f, "raw {:?} {}", kind, entry_path.display()),
        }
    }
}

impl Event {
    /// The path this event concerns, when it has exactly one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Event::Add(p, _)
            | Event::AddDir(p, _)
            | Event::Change(p, _)
            | Event::Unlink(p)
            | Event::UnlinkDir(p) => Some(p),
            Event::Ready | Event::Raw { .. } => None,
        }
    }
}

/// The set of requirements for a watch engine's event handling functions, mirroring
/// `notify::EventHandler` and `notify_debouncer_full::DebounceEventHandler`.
pub trait EventHandler: Send + 'static {
    /// Handles a successfully produced event.
    fn handle_event(&mut self, event: Event);

    /// Handles an error surfaced by the engine (see §7).
    fn handle_error(&mut self, error: Error) {
        log::warn!("watch error: {error}");
    }
}

impl<F> EventHandler for F
where
    F: FnMut(Event) + Send + 'static,
{
    fn handle_event(&mut self, event: Event) {
        (self)(event)
    }
}

#[cfg(feature = "crossbeam-channel")]
impl EventHandler for crossbeam_channel::Sender<Event> {
    fn handle_event(&mut self, event: Event) {
        let _ = self.send(event);
    }
}

impl EventHandler for std::sync::mpsc::Sender<Event> {
    fn handle_event(&mut self, event: Event) {
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_extraction() {
        let stats = Stats {
            size: 0,
            mtime: 0,
            is_dir: false,
        };
        assert_eq!(
            Event::Add(PathBuf::from("/a"), stats).path(),
            Some(Path::new("/a"))
        );
        assert_eq!(Event::Ready.path(), None);
    }

    #[test]
    fn closures_are_event_handlers() {
        use std::sync::mpsc;
        let (tx, rx) = mpsc::channel();
        let mut handler = move |e: Event| tx.send(e).unwrap();
        handler.handle_event(Event::Ready);
        assert_eq!(rx.recv().unwrap(), Event::Ready);
    }
}
