//! Cross-platform filesystem watching on top of [`notify`], with directory
//! reconciliation, symlink-aware recursion, and throttled change delivery.
//!
//! `FsWatcher` is the entry point: add a path, receive a de-duplicated stream
//! of [`Event`]s through any [`EventHandler`] (a closure, an `mpsc::Sender`, or
//! a `crossbeam_channel::Sender` behind the default `crossbeam-channel`
//! feature).
//!
//! ```no_run
//! use notify_reconciler::{FsWatcher, Options};
//!
//! let watcher = FsWatcher::new(Options::default(), |event| println!("{event}"))?;
//! watcher.add("./src")?;
//! watcher.ready();
//! # Ok::<(), notify_reconciler::Error>(())
//! ```

pub mod classify;
pub mod config;
pub mod dir_watcher;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod facade;
pub mod file_watcher;
pub mod native;
pub mod poll;
pub mod readdir;
pub mod symlink;
pub mod throttle;
pub mod watched_dir;

pub use config::Options;
pub use error::{Error, Result};
pub use event::{Event, EventHandler, RawKind, Stats};
pub use facade::FsWatcher;
