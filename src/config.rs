//! Watch options and the filter closures the core calls back into.
//!
//! Mirrors the builder style of [`notify::Config`]: a `Copy`-ish struct built up with
//! `with_*` methods that each consume and return `Self`.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether a path should be skipped entirely.
pub type IgnorePredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Predicate deciding whether a file entry under a directory scan should be kept.
pub type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Options controlling how paths are watched.
///
/// Unlike `notify::Config`, which configures a single backend, `Options` configures
/// the reconciliation layer sitting on top of it: throttling is not tunable here (the
/// windows are fixed per §4.3 of the design), but everything the spec calls out as a
/// facade-supplied option is.
#[derive(Clone)]
pub struct Options {
    persistent: bool,
    use_polling: bool,
    interval: Duration,
    binary_interval: Duration,
    enable_binary_interval: bool,
    follow_symlinks: bool,
    ignore_initial: bool,
    depth: Option<u32>,
    ignored: Option<IgnorePredicate>,
    filter_path: Option<PathFilter>,
    filter_dir: Option<PathFilter>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("persistent", &self.persistent)
            .field("use_polling", &self.use_polling)
            .field("interval", &self.interval)
            .field("binary_interval", &self.binary_interval)
            .field("enable_binary_interval", &self.enable_binary_interval)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("ignore_initial", &self.ignore_initial)
            .field("depth", &self.depth)
            .field("ignored", &self.ignored.is_some())
            .field("filter_path", &self.filter_path.is_some())
            .field("filter_dir", &self.filter_dir.is_some())
            .finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            persistent: true,
            use_polling: false,
            interval: Duration::from_millis(100),
            binary_interval: Duration::from_millis(300),
            enable_binary_interval: false,
            follow_symlinks: true,
            ignore_initial: false,
            depth: None,
            ignored: None,
            filter_path: None,
            filter_dir: None,
        }
    }
}

impl Options {
    /// Whether the native/polling handle should survive after the initial scan (`true`,
    /// the default) or be torn down as soon as it fires once.
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Returns the current `persistent` setting.
    pub fn persistent(&self) -> bool {
        self.persistent
    }

    /// Force the polling backend instead of the event-driven one.
    pub fn with_use_polling(mut self, use_polling: bool) -> Self {
        self.use_polling = use_polling;
        self
    }

    /// Returns the current `use_polling` setting.
    pub fn use_polling(&self) -> bool {
        self.use_polling
    }

    /// Poll interval used by [`PollingWatchRegistry`](crate::poll::PollingWatchRegistry).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the current poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll interval used for paths the binary classifier flags, when
    /// `enable_binary_interval` is set.
    pub fn with_binary_interval(mut self, interval: Duration) -> Self {
        self.binary_interval = interval;
        self
    }

    /// Returns the current binary poll interval.
    pub fn binary_interval(&self) -> Duration {
        self.binary_interval
    }

    /// Whether binary files get the (usually longer) `binary_interval` instead of `interval`.
    pub fn with_enable_binary_interval(mut self, enable: bool) -> Self {
        self.enable_binary_interval = enable;
        self
    }

    /// Returns whether the binary interval is in effect.
    pub fn enable_binary_interval(&self) -> bool {
        self.enable_binary_interval
    }

    /// Whether symlinks are followed (`true`, the default) or treated as leaf entities.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Returns the current `follow_symlinks` setting.
    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Whether the initial `add`/`addDir` burst on a fresh subscription is suppressed.
    pub fn with_ignore_initial(mut self, ignore_initial: bool) -> Self {
        self.ignore_initial = ignore_initial;
        self
    }

    /// Returns the current `ignore_initial` setting.
    pub fn ignore_initial(&self) -> bool {
        self.ignore_initial
    }

    /// Maximum recursion depth for directory watches. `None` means unlimited.
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    /// Returns the current depth limit.
    pub fn depth(&self) -> Option<u32> {
        self.depth
    }

    /// Install an ignore predicate. Defaults to "never ignore" when unset.
    pub fn with_ignored(mut self, ignored: IgnorePredicate) -> Self {
        self.ignored = Some(ignored);
        self
    }

    /// Install a filter applied to files encountered during a directory rescan.
    pub fn with_filter_path(mut self, filter: PathFilter) -> Self {
        self.filter_path = Some(filter);
        self
    }

    /// Install a filter applied to sub-directories encountered during a directory rescan.
    pub fn with_filter_dir(mut self, filter: PathFilter) -> Self {
        self.filter_dir = Some(filter);
        self
    }

    /// Evaluates the ignore predicate, defaulting to "not ignored" when none was set.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.as_ref().map_or(false, |pred| pred(path))
    }

    /// Evaluates the file filter, defaulting to "keep" when none was set.
    pub fn filter_path(&self, path: &Path) -> bool {
        self.filter_path.as_ref().map_or(true, |f| f(path))
    }

    /// Evaluates the directory filter, defaulting to "keep" when none was set.
    pub fn filter_dir(&self, path: &Path) -> bool {
        self.filter_dir.as_ref().map_or(true, |f| f(path))
    }

    /// Whether either filter was configured (used to decide whether a rescan is
    /// "glob active", per §4.6 step 1).
    pub fn has_glob(&self) -> bool {
        self.filter_path.is_some() || self.filter_dir.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = Options::default();
        assert!(opts.persistent());
        assert!(!opts.use_polling());
        assert!(opts.follow_symlinks());
        assert!(!opts.ignore_initial());
        assert_eq!(opts.depth(), None);
        assert!(!opts.has_glob());
    }

    #[test]
    fn unset_predicates_default_permissively() {
        let opts = Options::default();
        assert!(!opts.is_ignored(Path::new("/tmp/x")));
        assert!(opts.filter_path(Path::new("/tmp/x")));
        assert!(opts.filter_dir(Path::new("/tmp/x")));
    }

    #[test]
    fn ignore_predicate_is_honored() {
        let opts = Options::default().with_ignored(Arc::new(|p: &Path| {
            p.extension().map_or(false, |e| e == "tmp")
        }));
        assert!(opts.is_ignored(Path::new("/tmp/a.tmp")));
        assert!(!opts.is_ignored(Path::new("/tmp/a.rs")));
    }
}
