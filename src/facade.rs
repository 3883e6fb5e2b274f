//! `FsWatcher` (§4.9): the crate's single public entry point, owning every
//! collaborator described in §2-§4 behind one `Mutex` so native-thread
//! callbacks and direct API calls serialize onto the same state, the way
//! `notify-debouncer-full` serializes its watcher callback and its public API
//! through one `Mutex<DebounceDataInner>`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::classify;
use crate::config::Options;
use crate::dir_watcher::{self, Discovered};
use crate::dispatcher::{self, Classification};
use crate::error::{Error, Result};
use crate::event::{Event, EventHandler, RawKind, Stats};
use crate::file_watcher::FileWatcherState;
use crate::native::{self, NativeWatchRegistry};
use crate::poll::{PollTick, PollingWatchRegistry};
use crate::symlink::{SymlinkOutcome, SymlinkResolver};
use crate::throttle::{Action, Throttler};
use crate::watched_dir::WatchedDirStore;

const READDIR_THROTTLE_WINDOW: Duration = Duration::from_millis(1000);
const WATCH_THROTTLE_WINDOW: Duration = Duration::from_millis(5);

/// Makes `path` absolute without resolving any symlink in it (§3's
/// `WatchedPath` is explicitly "symlink-unexpanded"): a relative path is
/// joined onto the current directory, an already-absolute one is returned
/// untouched. Symlink resolution, when wanted, is `dispatcher::classify` and
/// `SymlinkResolver`'s job, not this one's.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().map_err(|e| Error::io(path, e))?;
        Ok(cwd.join(path))
    }
}

struct EngineData {
    options: Options,
    handler: Box<dyn EventHandler>,
    watched_dirs: WatchedDirStore,
    throttler: Throttler,
    symlinks: SymlinkResolver,
    files: HashMap<PathBuf, FileWatcherState>,
    /// Currently watched directories, with the recursion budget remaining
    /// below each (mirrors `Options::depth`).
    active_dirs: HashMap<PathBuf, Option<u32>>,
    /// Symlinks tracked as leaf entities (`Options::follow_symlinks() == false`):
    /// watched at the link path itself rather than recursed into.
    leaf_symlinks: HashSet<PathBuf>,
    watched_roots: HashSet<PathBuf>,
    native: NativeWatchRegistry,
    poll: PollingWatchRegistry,
    ready_emitted: bool,
    closed: bool,
    /// Lets a method spawn a one-shot timer thread that later re-acquires the
    /// same `Mutex<EngineData>` (used to hold the `readdir` throttle window
    /// open for its full duration and perform the forced re-run in §4.6 step 5;
    /// see `schedule_readdir_rerun`).
    self_weak: Weak<Mutex<EngineData>>,
}

/// The public facade: add paths, receive events, and close when done.
///
/// ```no_run
/// use notify_reconciler::{FsWatcher, Options};
///
/// let mut watcher = FsWatcher::new(Options::default(), |event| {
///     println!("{event}");
/// })?;
/// watcher.add(".")?;
/// watcher.ready();
/// # Ok::<(), notify_reconciler::Error>(())
/// ```
pub struct FsWatcher {
    data: Arc<Mutex<EngineData>>,
}

impl FsWatcher {
    /// Builds a watcher with the given `options`, delivering events to `handler`.
    pub fn new(options: Options, handler: impl EventHandler) -> Result<Self> {
        // Probe that the native backend can actually be constructed before the
        // cyclic setup below, which has no good way to surface a construction
        // failure as an `Err` (its `NativeWatchRegistry` must be built inside
        // the closure, using a `Weak` that only exists once the closure runs).
        // `RecommendedWatcher::new` takes the same arguments both times, so a
        // successful probe here means the real construction below will succeed
        // too; only catastrophic OS resource exhaustion could make them diverge.
        NativeWatchRegistry::new(|_: notify::Result<notify::Event>| {})?;

        let data = Arc::new_cyclic(move |weak: &Weak<Mutex<EngineData>>| {
            let native_weak = weak.clone();
            let native = NativeWatchRegistry::new(move |res: notify::Result<notify::Event>| {
                let Some(data) = native_weak.upgrade() else {
                    return;
                };
                let mut guard = data.lock().unwrap();
                match res {
                    Ok(event) => guard.on_native_event(event),
                    Err(err) => guard.on_native_error(err),
                }
            })
            .expect("native backend construction should match the preceding probe");

            let poll_weak = weak.clone();
            let poll = PollingWatchRegistry::new(move |tick: PollTick| {
                if let Some(data) = poll_weak.upgrade() {
                    data.lock().unwrap().on_poll_tick(tick);
                }
            });

            Mutex::new(EngineData {
                options,
                handler: Box::new(handler),
                watched_dirs: WatchedDirStore::new(),
                throttler: Throttler::new(),
                symlinks: SymlinkResolver::new(),
                files: HashMap::new(),
                active_dirs: HashMap::new(),
                leaf_symlinks: HashSet::new(),
                watched_roots: HashSet::new(),
                native,
                poll,
                ready_emitted: false,
                closed: false,
                self_weak: weak.clone(),
            })
        });

        Ok(Self { data })
    }

    /// Adds `path` (file or directory) to the watch set.
    pub fn add(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let abs = absolutize(path)?;
        let mut data = self.data.lock().unwrap();
        data.watched_roots.insert(abs.clone());
        let depth = data.options.depth();
        data.add_path(&abs, depth)
    }

    /// Removes `path` (and everything discovered beneath it) from the watch set.
    pub fn unwatch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let abs = absolutize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut data = self.data.lock().unwrap();
        data.watched_roots.remove(&abs);
        data.unwatch_path(&abs);
        Ok(())
    }

    /// Emits `Event::Ready` once, signalling that every path added so far has
    /// completed its initial scan. Since `add` runs its scan synchronously,
    /// callers call this after their initial batch of `add` calls.
    pub fn ready(&self) {
        let mut data = self.data.lock().unwrap();
        if !data.ready_emitted {
            data.ready_emitted = true;
            data.handler.handle_event(Event::Ready);
        }
    }

    /// Stops delivering events and synchronously tears down every native and
    /// polling handle opened for paths added to this watcher.
    pub fn close(&self) {
        let mut data = self.data.lock().unwrap();
        data.closed = true;
        let roots: Vec<PathBuf> = data.watched_roots.drain().collect();
        for root in roots {
            data.unwatch_path(&root);
        }
    }
}

impl EngineData {
    fn effective_interval(&self, path: &Path) -> Duration {
        if self.options.enable_binary_interval() && classify::is_binary_path(path) {
            self.options.binary_interval()
        } else {
            self.options.interval()
        }
    }

    fn add_path(&mut self, abs: &Path, depth_remaining: Option<u32>) -> Result<()> {
        if self.options.is_ignored(abs) {
            return Ok(());
        }
        match dispatcher::classify(abs) {
            Classification::Missing => Err(Error::PathNotFound(abs.to_path_buf())),
            Classification::Symlink { target } => {
                let Some(target) = target else {
                    return Err(Error::PathNotFound(abs.to_path_buf()));
                };
                let target = if target.is_absolute() {
                    target
                } else {
                    abs.parent().unwrap_or(Path::new("/")).join(target)
                };
                if !self.options.follow_symlinks() {
                    return self.watch_leaf_symlink(abs, &target);
                }
                match self.symlinks.observe(&target, true) {
                    SymlinkOutcome::Handled => Ok(()),
                    SymlinkOutcome::Continue => self.add_path(&target, depth_remaining),
                }
            }
            Classification::Dir => self.watch_dir(abs, depth_remaining),
            Classification::File => self.watch_file(abs),
        }
    }

    fn watch_file(&mut self, abs: &Path) -> Result<()> {
        if self.files.contains_key(abs) {
            return Ok(());
        }
        let interval = self.effective_interval(abs);
        if self.options.use_polling() {
            self.poll.subscribe(abs, interval, self.options.persistent());
        } else {
            self.native.subscribe(abs)?;
        }

        let stats = std::fs::metadata(abs).ok().map(|m| Stats::from_metadata(&m));
        if !self.options.ignore_initial() {
            if let Some(stats) = stats {
                self.handler.handle_event(Event::Add(abs.to_path_buf(), stats));
            }
        }
        self.files.insert(abs.to_path_buf(), FileWatcherState::new(stats));
        Ok(())
    }

    /// Tracks a symlink as a leaf entity (§4.4, `follow_symlinks=false`): the
    /// link path itself is watched and reported, rather than recursing into
    /// `target`. A `change` fires only when the link is repointed, so the
    /// resolved target string is what's compared, not the link's own stat.
    fn watch_leaf_symlink(&mut self, abs: &Path, target: &Path) -> Result<()> {
        if self.leaf_symlinks.contains(abs) {
            return Ok(());
        }
        if self.options.use_polling() {
            self.poll.subscribe(abs, self.effective_interval(abs), self.options.persistent());
        } else {
            self.native.subscribe(abs)?;
        }
        self.leaf_symlinks.insert(abs.to_path_buf());

        if !self.symlinks.is_known_leaf(abs) {
            self.symlinks.record_leaf(abs, target);
            if !self.options.ignore_initial() {
                let stats = std::fs::symlink_metadata(abs)
                    .map(|m| Stats::from_metadata(&m))
                    .unwrap_or(Stats { size: 0, mtime: 0, is_dir: false });
                self.handler.handle_event(Event::Add(abs.to_path_buf(), stats));
            }
        }
        Ok(())
    }

    fn watch_dir(&mut self, abs: &Path, depth_remaining: Option<u32>) -> Result<()> {
        if self.active_dirs.contains_key(abs) {
            return Ok(());
        }
        let interval = self.effective_interval(abs);
        if self.options.use_polling() {
            self.poll.subscribe(abs, interval, self.options.persistent());
        } else {
            self.native.subscribe(abs)?;
        }
        self.active_dirs.insert(abs.to_path_buf(), depth_remaining);

        // A directory discovered via its parent's rescan already had its own
        // `AddDir` emitted there (it is recorded in the parent `WatchedDir`
        // before `process_discovered` recurses here). Only a directory added
        // directly — i.e. one with no tracking parent — still needs its own
        // announcement.
        let already_announced = abs
            .parent()
            .and_then(|parent| self.watched_dirs.get(parent))
            .map_or(false, |wd| {
                abs.file_name().map_or(false, |name| wd.has(name))
            });
        if !already_announced && !self.options.ignore_initial() {
            if let Ok(meta) = std::fs::metadata(abs) {
                self.handler
                    .handle_event(Event::AddDir(abs.to_path_buf(), Stats::from_metadata(&meta)));
            }
        }

        let ignore_initial = self.options.ignore_initial();
        let discovered = dir_watcher::rescan(
            abs,
            &mut self.watched_dirs,
            &self.options,
            ignore_initial,
            self.handler.as_mut(),
        )?;
        self.process_discovered(discovered, depth_remaining)
    }

    fn process_discovered(&mut self, discovered: Vec<Discovered>, depth_remaining: Option<u32>) -> Result<()> {
        for child in discovered {
            if child.is_symlink {
                // A symlinked entry must go through `add_path`'s own classification
                // (not straight to `watch_dir`/`watch_file`), since `is_dir` here
                // already followed the link — bypassing that would let a directory
                // symlink cycle (S6) recurse into `watch_dir` forever instead of
                // being caught by `SymlinkResolver`.
                self.add_path(&child.path, depth_remaining)?;
            } else if child.is_dir {
                if let Some(outcome) = dispatcher::next_depth(depth_remaining) {
                    self.watch_dir(&child.path, outcome.into_option())?;
                }
            } else {
                self.watch_file(&child.path)?;
            }
        }
        Ok(())
    }

    /// Stops watching `abs` (and, for a directory, everything discovered
    /// beneath it) without announcing anything — used for an explicit
    /// `FsWatcher::unwatch` call, where the caller asked to stop watching, not
    /// to be told the entries disappeared.
    fn unwatch_path(&mut self, abs: &Path) {
        self.unwatch_path_inner(abs, false);
    }

    /// Tears down `abs` the same way, but emits `Unlink`/`UnlinkDir` for every
    /// descendant torn down — the rename-compensation path (§4.1/S4), where a
    /// watched directory itself vanished and the cascade must announce its
    /// former children too, since the OS will not deliver separate events for
    /// entries it already considers gone along with their parent.
    fn cascade_removal(&mut self, abs: &Path) {
        self.unwatch_path_inner(abs, true);
    }

    fn unwatch_path_inner(&mut self, abs: &Path, notify: bool) {
        if self.leaf_symlinks.remove(abs) {
            if self.options.use_polling() {
                self.poll.unsubscribe(abs);
            } else {
                self.native.unsubscribe(abs);
            }
            if notify {
                self.handler.handle_event(Event::Unlink(abs.to_path_buf()));
            }
            return;
        }

        if self.files.remove(abs).is_some() {
            if self.options.use_polling() {
                self.poll.unsubscribe(abs);
            } else {
                self.native.unsubscribe(abs);
            }
            if notify {
                self.handler.handle_event(Event::Unlink(abs.to_path_buf()));
            }
            return;
        }

        if self.active_dirs.remove(abs).is_some() {
            if self.options.use_polling() {
                self.poll.unsubscribe(abs);
            } else {
                self.native.unsubscribe(abs);
            }
            self.watched_dirs.forget(abs);
            if notify {
                self.handler.handle_event(Event::UnlinkDir(abs.to_path_buf()));
            }

            let descendants: Vec<PathBuf> = self
                .active_dirs
                .keys()
                .filter(|p| p.starts_with(abs))
                .cloned()
                .collect();
            for dir in descendants {
                self.unwatch_path_inner(&dir, notify);
            }
            let files: Vec<PathBuf> = self.files.keys().filter(|p| p.starts_with(abs)).cloned().collect();
            for file in files {
                self.unwatch_path_inner(&file, notify);
            }
            let symlinks: Vec<PathBuf> = self
                .leaf_symlinks
                .iter()
                .filter(|p| p.starts_with(abs))
                .cloned()
                .collect();
            for link in symlinks {
                self.unwatch_path_inner(&link, notify);
            }
        }
    }

    fn rescan_dir(&mut self, dir: &Path, depth_remaining: Option<u32>) {
        // §4.6 step 1: a glob filter bypasses the readdir throttle entirely, so a
        // targeted watch doesn't miss intersecting changes behind the window.
        if self.options.has_glob() {
            self.perform_rescan(dir, depth_remaining);
            return;
        }

        if self
            .throttler
            .throttle(Action::Readdir, dir, READDIR_THROTTLE_WINDOW)
            .is_none()
        {
            // A window is already open for this directory: this call is exactly
            // the "further work arrived" case the open window's `suppressed` flag
            // exists to record, so nothing more to do here — the re-run scheduled
            // when that window was opened will pick this up.
            return;
        }

        self.perform_rescan(dir, depth_remaining);
        self.schedule_readdir_rerun(dir, depth_remaining);
    }

    /// Runs the actual directory diff and recurses into whatever it discovered.
    /// Shared by the glob-bypass path, the first call of a throttle window, and
    /// the delayed re-run the window schedules once it elapses.
    fn perform_rescan(&mut self, dir: &Path, depth_remaining: Option<u32>) {
        let result = dir_watcher::rescan(
            dir,
            &mut self.watched_dirs,
            &self.options,
            false,
            self.handler.as_mut(),
        );
        match result {
            Ok(discovered) => {
                if let Err(err) = self.process_discovered(discovered, depth_remaining) {
                    self.handle_error(err);
                }
            }
            Err(err) => self.handle_error(err),
        }
    }

    /// Keeps the `readdir` throttle window open for its full
    /// `READDIR_THROTTLE_WINDOW` rather than clearing it the instant the
    /// triggering rescan returns (clearing it synchronously would mean the
    /// window never actually suppresses a concurrent notification — the very
    /// next one simply opens a fresh window). A background timer thread sleeps
    /// out the remainder of the window, then clears the ledger entry by key and,
    /// per §4.6 step 5, re-runs the rescan exactly once more if any notification
    /// arrived (and was suppressed) while the window was open.
    fn schedule_readdir_rerun(&self, dir: &Path, depth_remaining: Option<u32>) {
        let weak = self.self_weak.clone();
        let dir = dir.to_path_buf();
        std::thread::spawn(move || {
            std::thread::sleep(READDIR_THROTTLE_WINDOW);
            let Some(data) = weak.upgrade() else {
                return;
            };
            let mut guard = data.lock().unwrap();
            if guard.closed {
                return;
            }
            let was_throttled = guard.throttler.clear_window(Action::Readdir, &dir);
            if was_throttled {
                guard.rescan_dir(&dir, depth_remaining);
            }
        });
    }

    fn on_native_event(&mut self, event: notify::Event) {
        if self.closed {
            return;
        }
        let kind = native::classify_raw(&event);
        let paths = event.paths.clone();
        for path in paths {
            self.handle_path_notification(&path, kind);
        }
    }

    /// Handles a fatal error surfaced by the native backend (§7's
    /// `WatcherUnusable` row): marks every affected path's entry unusable so
    /// teardown never touches it again, then — on the Windows permission-denied
    /// quirk specifically — swallows the error unless a reopen probe shows the
    /// path is still genuinely gone, per §4.1's EPERM recovery procedure.
    fn on_native_error(&mut self, err: notify::Error) {
        if self.closed {
            return;
        }
        for path in &err.paths {
            self.native.mark_unusable(path);
        }
        if cfg!(windows) && native::is_permission_denied(&err) {
            let probe_succeeded = err
                .paths
                .iter()
                .any(|p| native::probe_reopen(p).unwrap_or(false));
            if !probe_succeeded {
                log::debug!("swallowing native EPERM error after failed reopen probe: {err}");
                return;
            }
        }
        self.handle_error(Error::from(err));
    }

    fn on_poll_tick(&mut self, tick: PollTick) {
        if self.closed {
            return;
        }
        let kind = if tick.current.is_none() || tick.previous.is_none() {
            RawKind::Rename
        } else {
            RawKind::Change
        };
        self.handle_path_notification(&tick.path.clone(), kind);
    }

    /// Emits the verbatim `Raw` counterpart of a notification, alongside
    /// whatever processed event the caller derives from it (§4.1: the native
    /// registry "fans out to `listeners[]` (processed) and `raw_emitters[]`
    /// (verbatim)" — both fire for every notification, not just untracked ones).
    fn emit_raw(&mut self, path: &Path, kind: RawKind) {
        let watched_path = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf());
        let entry_path = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf());
        self.handler.handle_event(Event::Raw {
            kind,
            entry_path,
            watched_path,
        });
    }

    fn handle_path_notification(&mut self, path: &Path, kind: RawKind) {
        self.emit_raw(path, kind);

        if let Some(depth_remaining) = self.active_dirs.get(path).copied() {
            if !path.exists() {
                let parent_dir = path.parent().map(PathBuf::from);
                self.cascade_removal(path);
                if let Some(parent) = parent_dir {
                    if let Some(parent_depth) = self.active_dirs.get(&parent).copied() {
                        self.rescan_dir(&parent, parent_depth);
                    }
                }
            } else {
                self.rescan_dir(path, depth_remaining);
            }
            return;
        }

        // An exact match on a directly-watched file or leaf symlink must be tried
        // before falling back to "parent is an active dir" below: every file or
        // leaf symlink discovered by a directory rescan (`process_discovered` ->
        // `watch_file`/`watch_leaf_symlink`) lives directly inside a watched
        // directory, so the parent-rescan fallback would otherwise intercept its
        // notifications first and return before this code is ever reached — no
        // rescan diff has anything to report for a child whose membership in the
        // parent `WatchedDir` hasn't changed, so a content change would be
        // silently dropped (§4.1's "descendant broadcast": the exact match, not
        // the parent fallback, is what substitutes for a missing file-level
        // watch).
        if self.leaf_symlinks.contains(path) {
            match std::fs::read_link(path) {
                Err(_) => {
                    self.unwatch_path(path);
                    self.handler.handle_event(Event::Unlink(path.to_path_buf()));
                }
                Ok(new_target) => {
                    if self.symlinks.leaf_target_changed(path, &new_target) {
                        self.symlinks.record_leaf(path, &new_target);
                        let stats = std::fs::symlink_metadata(path)
                            .map(|m| Stats::from_metadata(&m))
                            .unwrap_or(Stats { size: 0, mtime: 0, is_dir: false });
                        self.handler.handle_event(Event::Change(path.to_path_buf(), stats));
                    }
                }
            }
            return;
        }

        if self.files.contains_key(path) {
            if self
                .throttler
                .throttle(Action::Watch, path, WATCH_THROTTLE_WINDOW)
                .is_none()
            {
                return;
            }
            let current = std::fs::metadata(path).ok().map(|m| Stats::from_metadata(&m));
            let done = {
                let state = self.files.get_mut(path).expect("checked above");
                state.observe(path, current, self.handler.as_mut())
            };
            if done {
                self.unwatch_path(path);
            }
            return;
        }

        // Fallback: a path with no tracked entry of its own (a new or removed
        // child the rescan diff hasn't seen yet) substitutes its parent
        // directory's rescan for the missing per-entry watch.
        if let Some(parent) = path.parent() {
            if self.active_dirs.contains_key(parent) {
                let depth_remaining = self.active_dirs.get(parent).copied().flatten();
                self.rescan_dir(parent, depth_remaining);
            }
        }
    }

    fn handle_error(&mut self, error: Error) {
        self.handler.handle_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn watching_a_directory_reports_existing_children_then_new_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(Options::default().with_use_polling(true).with_interval(Duration::from_millis(20)), tx).unwrap();
        watcher.add(dir.path()).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(first, Event::AddDir(_, _)) || matches!(first, Event::Add(_, _)));

        std::fs::write(dir.path().join("b.txt"), b"y").unwrap();

        let mut saw_new_file = false;
        for _ in 0..50 {
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
                if matches!(&event, Event::Add(p, _) if p.ends_with("b.txt")) {
                    saw_new_file = true;
                    break;
                }
            } else {
                break;
            }
        }
        assert!(saw_new_file, "expected an Add event for the new file");
    }

    #[test]
    fn watched_root_itself_gets_its_own_add_dir_event() {
        let dir = tempfile::tempdir().unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(Options::default().with_use_polling(true), tx).unwrap();
        watcher.add(dir.path()).unwrap();

        let expected = dir.path().to_path_buf();
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match first {
            Event::AddDir(p, _) => assert_eq!(p, expected),
            other => panic!("expected AddDir for the watched root, got {other:?}"),
        }
    }

    #[test]
    fn removed_watched_directory_reports_unlink_dir_and_its_former_children() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let sub = root.join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("c.txt"), b"x").unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(
            Options::default().with_use_polling(true).with_interval(Duration::from_millis(20)),
            tx,
        )
        .unwrap();
        watcher.add(dir.path()).unwrap();

        // Drain the initial scan (root AddDir, sub AddDir, c.txt Add).
        for _ in 0..10 {
            if rx.recv_timeout(Duration::from_millis(200)).is_err() {
                break;
            }
        }

        std::fs::remove_dir_all(&sub).unwrap();

        let mut saw_unlink_dir = false;
        let mut saw_unlink_child = false;
        for _ in 0..100 {
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(Event::UnlinkDir(p)) if p == sub => saw_unlink_dir = true,
                Ok(Event::Unlink(p)) if p == sub.join("c.txt") => saw_unlink_child = true,
                Ok(_) => {}
                Err(_) => break,
            }
            if saw_unlink_dir && saw_unlink_child {
                break;
            }
        }
        assert!(saw_unlink_dir, "expected UnlinkDir for the removed directory");
        assert!(saw_unlink_child, "expected Unlink for its former child");
    }

    #[test]
    #[cfg(unix)]
    fn directory_symlink_cycle_does_not_recurse_forever() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::os::unix::fs::symlink(&root, root.join("loop")).unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(Options::default().with_use_polling(true), tx).unwrap();
        // If the cycle isn't broken during the scan this call never returns.
        watcher.add(&root).unwrap();

        let mut saw_root_add_dir = 0;
        while let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
            if matches!(&event, Event::AddDir(p, _) if p == &root) {
                saw_root_add_dir += 1;
            }
        }
        assert_eq!(saw_root_add_dir, 1, "the real root path must be announced exactly once");
    }

    #[test]
    #[cfg(unix)]
    fn adding_a_leaf_symlink_directly_is_classified_as_a_symlink_not_resolved_away() {
        // A root-level `add()` of a symlink must still reach `dispatcher::classify`
        // as `Classification::Symlink` (not get resolved away before classification),
        // so `follow_symlinks=false` tracks the link itself as a leaf.
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(
            Options::default().with_use_polling(true).with_follow_symlinks(false),
            tx,
        )
        .unwrap();
        watcher.add(&link).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match first {
            Event::Add(p, _) => assert_eq!(p, link, "leaf symlink must be tracked at its own path"),
            other => panic!("expected a leaf Add for the symlink itself, got {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn adding_a_followed_symlink_directly_watches_its_resolved_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(Options::default().with_use_polling(true), tx).unwrap();
        watcher.add(&link).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match first {
            Event::AddDir(p, _) => assert_eq!(p, target, "followed symlink must watch its resolved target"),
            other => panic!("expected AddDir for the resolved target, got {other:?}"),
        }
    }

    #[test]
    fn raw_event_accompanies_the_processed_event_for_a_tracked_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"v1").unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(
            Options::default().with_use_polling(true).with_interval(Duration::from_millis(20)),
            tx,
        )
        .unwrap();
        watcher.add(&file).unwrap();

        // Drain the initial Add (and its accompanying Raw).
        for _ in 0..5 {
            if rx.recv_timeout(Duration::from_millis(100)).is_err() {
                break;
            }
        }

        std::fs::write(&file, b"v2-longer").unwrap();

        let mut saw_raw = false;
        let mut saw_change = false;
        for _ in 0..50 {
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(Event::Raw { entry_path, .. }) if entry_path == Path::new("a.txt") => saw_raw = true,
                Ok(Event::Change(p, _)) if p == file => saw_change = true,
                Ok(_) => {}
                Err(_) => break,
            }
            if saw_raw && saw_change {
                break;
            }
        }
        assert!(saw_raw, "expected a Raw event alongside the processed one");
        assert!(saw_change, "expected a Change event for the tracked file");
    }

    #[test]
    fn unwatch_stops_future_notifications_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel();
        let watcher = FsWatcher::new(Options::default().with_use_polling(true), tx).unwrap();
        watcher.add(dir.path()).unwrap();
        watcher.unwatch(dir.path()).unwrap();
    }

    #[test]
    fn ready_is_emitted_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let watcher = FsWatcher::new(Options::default().with_use_polling(true), tx).unwrap();
        watcher.add(dir.path()).unwrap();
        watcher.ready();
        watcher.ready();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.iter().filter(|e| matches!(e, Event::Ready)).count(), 1);
    }
}
