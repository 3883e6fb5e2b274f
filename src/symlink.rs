//! Symlink cycle breaking and follow/leaf bookkeeping (§4.4).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What the caller should do after consulting the resolver about a symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkOutcome {
    /// The resolver has fully handled this symlink (emitted whatever event was
    /// needed, or broken a cycle); the caller must not recurse into it.
    Handled,
    /// The caller should continue processing the entry as normal (recurse into it
    /// if it is a directory, route it to `FileWatcher` if a file, etc).
    ///
    /// Kept as a distinct variant rather than collapsing to `bool` so call sites
    /// read as "continue into the entry" instead of an unexplained `false`,
    /// preserving the source's `undefined`-means-continue two-mode return.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemoryEntry {
    /// Follow mode: the resolved target we have already recorded for this symlink.
    Target(PathBuf),
    /// A cycle was detected and broken at this target; do not revisit it.
    CycleBreak,
}

/// Tracks resolved symlink targets to implement follow-vs-leaf semantics and
/// break cycles (`a -> b -> a`).
#[derive(Debug, Default)]
pub struct SymlinkResolver {
    memory: HashMap<PathBuf, MemoryEntry>,
}

impl SymlinkResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consults the resolver about a symlink at `link_path` resolving to `target`.
    ///
    /// `follow_symlinks` selects between the two modes described in §4.4. Returns
    /// `Handled` when the caller must not recurse further (a leaf `change`/`add`
    /// was already the right thing to emit, or a cycle was broken), and `Continue`
    /// when the caller should keep processing normally.
    pub fn observe(&mut self, target: &Path, follow_symlinks: bool) -> SymlinkOutcome {
        if follow_symlinks {
            match self.memory.get(target) {
                Some(MemoryEntry::CycleBreak) => SymlinkOutcome::Handled,
                _ => {
                    self.memory
                        .insert(target.to_path_buf(), MemoryEntry::CycleBreak);
                    SymlinkOutcome::Continue
                }
            }
        } else {
            // Leaf mode: bookkeeping only, the caller decides add-vs-change from
            // whether the target changed since last observation.
            self.memory
                .insert(target.to_path_buf(), MemoryEntry::Target(target.to_path_buf()));
            SymlinkOutcome::Continue
        }
    }

    /// In leaf mode (`follow_symlinks=false`), reports whether `link_path`'s
    /// recorded target differs from `new_target` (i.e. the symlink was repointed,
    /// so a `change` rather than silence is due). Returns `true` on first
    /// observation was already handled by `record_leaf`; call this beforehand.
    pub fn leaf_target_changed(&self, link_path: &Path, new_target: &Path) -> bool {
        match self.memory.get(link_path) {
            Some(MemoryEntry::Target(prev)) => prev != new_target,
            _ => false,
        }
    }

    /// Records (or updates) the resolved target for a leaf-mode symlink.
    pub fn record_leaf(&mut self, link_path: &Path, target: &Path) {
        self.memory
            .insert(link_path.to_path_buf(), MemoryEntry::Target(target.to_path_buf()));
    }

    /// Whether `link_path` has been observed in leaf mode before.
    pub fn is_known_leaf(&self, link_path: &Path) -> bool {
        matches!(self.memory.get(link_path), Some(MemoryEntry::Target(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_mode_visits_each_target_once() {
        let mut r = SymlinkResolver::new();
        assert_eq!(
            r.observe(Path::new("/real"), true),
            SymlinkOutcome::Continue
        );
        assert_eq!(r.observe(Path::new("/real"), true), SymlinkOutcome::Handled);
    }

    #[test]
    fn cycle_ab_ba_visits_each_node_once() {
        let mut r = SymlinkResolver::new();
        // a -> b
        assert_eq!(r.observe(Path::new("/b"), true), SymlinkOutcome::Continue);
        // b -> a (cycle)
        assert_eq!(r.observe(Path::new("/a"), true), SymlinkOutcome::Continue);
        // a -> b again, already visited
        assert_eq!(r.observe(Path::new("/b"), true), SymlinkOutcome::Handled);
    }

    #[test]
    fn leaf_mode_detects_retargeting() {
        let mut r = SymlinkResolver::new();
        r.record_leaf(Path::new("/link"), Path::new("/t1"));
        assert!(!r.leaf_target_changed(Path::new("/link"), Path::new("/t1")));
        assert!(r.leaf_target_changed(Path::new("/link"), Path::new("/t2")));
    }

    #[test]
    fn unknown_leaf_reports_unknown() {
        let r = SymlinkResolver::new();
        assert!(!r.is_known_leaf(Path::new("/nope")));
    }
}
