//! Error type for the reconciliation engine.

use std::path::PathBuf;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the watch engine.
///
/// This mirrors the flat, `#[from]`-heavy style `notify` itself uses for its own
/// `notify::Error`, rather than a deep `ErrorKind` hierarchy: callers of a watch
/// engine mostly want to know *which path* failed and *why*, not navigate a tree
/// of error categories.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation (stat, read_dir, canonicalize, ...) failed for a path.
    #[error("io error for {path}: {source}")]
    Io {
        /// The path the operation was attempted on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The underlying native watch backend (`notify`) reported an error.
    #[error("watch backend error: {0}")]
    Watch(#[from] notify::Error),

    /// A path supplied to `FsWatcher::add` does not exist.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// A configuration value was invalid (e.g. a zero poll interval).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
