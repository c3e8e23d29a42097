//! Low-level watch coverage.
//!
//! [`CoverageTracker`] holds two sets:
//!
//! - **active**: paths that currently hold a real low-level watch
//! - **covering**: active directories that absorb their descendants' watches
//!
//! A path is *covered* when it is active itself or a covering ancestor
//! absorbs it (see [`CoverageDepth::absorbs`]). Covering directories are
//! always active.
//!
//! Ancestry is a path-segment prefix test recomputed on every call, never a
//! cached parent pointer.

use camino::{Utf8Path, Utf8PathBuf};
use pmx_core::{FxHashSet, fx_hash_set};

/// How far below itself a directory watch reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CoverageDepth {
    /// Every descendant (recursive low-level watch).
    #[default]
    Recursive,
    /// Direct children only (non-recursive low-level watch).
    Children,
}

impl CoverageDepth {
    /// Builds the depth from the `recursive` configuration flag.
    #[inline]
    #[must_use]
    pub const fn from_recursive(recursive: bool) -> Self {
        if recursive {
            Self::Recursive
        } else {
            Self::Children
        }
    }

    /// Returns `true` if directory watches at this depth are recursive.
    #[inline]
    #[must_use]
    pub const fn is_recursive(self) -> bool {
        matches!(self, Self::Recursive)
    }

    /// Returns `true` if a watch on `dir` reports events for `path`.
    ///
    /// `a/b` is covered by `a`, `ab` is not, and no path covers itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use pmx_watcher::CoverageDepth;
    ///
    /// let dir = Utf8Path::new("a");
    /// assert!(CoverageDepth::Recursive.covers(dir, Utf8Path::new("a/b/c.txt")));
    /// assert!(!CoverageDepth::Children.covers(dir, Utf8Path::new("a/b/c.txt")));
    /// assert!(!CoverageDepth::Recursive.covers(dir, Utf8Path::new("ab")));
    /// ```
    #[must_use]
    pub fn covers(self, dir: &Utf8Path, path: &Utf8Path) -> bool {
        match self {
            Self::Recursive => path != dir && path.starts_with(dir),
            Self::Children => path.parent() == Some(dir),
        }
    }

    /// Returns `true` if a covering `dir` can stand in for `path`'s own watch.
    ///
    /// A non-recursive watch reports a child directory appearing or going
    /// away, but nothing inside it, so at [`CoverageDepth::Children`] a
    /// descendant directory keeps its own watch.
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use pmx_watcher::CoverageDepth;
    ///
    /// let dir = Utf8Path::new("a");
    /// assert!(CoverageDepth::Children.absorbs(dir, Utf8Path::new("a/x.txt"), false));
    /// assert!(!CoverageDepth::Children.absorbs(dir, Utf8Path::new("a/b"), true));
    /// assert!(CoverageDepth::Recursive.absorbs(dir, Utf8Path::new("a/b"), true));
    /// ```
    #[must_use]
    pub fn absorbs(self, dir: &Utf8Path, path: &Utf8Path, is_dir: bool) -> bool {
        (self.is_recursive() || !is_dir) && self.covers(dir, path)
    }
}

/// Tracks active low-level watches and covering directories.
#[derive(Debug, Clone, Default)]
pub struct CoverageTracker {
    active: FxHashSet<Utf8PathBuf>,
    covering: FxHashSet<Utf8PathBuf>,
    depth: CoverageDepth,
}

impl CoverageTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(depth: CoverageDepth) -> Self {
        Self {
            active: fx_hash_set(),
            covering: fx_hash_set(),
            depth,
        }
    }

    /// Returns the configured coverage depth.
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> CoverageDepth {
        self.depth
    }

    /// Returns `true` if `path` holds its own low-level watch.
    #[inline]
    #[must_use]
    pub fn is_active(&self, path: &Utf8Path) -> bool {
        self.active.contains(path)
    }

    /// Returns `true` if `path` is a covering directory.
    #[inline]
    #[must_use]
    pub fn is_covering(&self, path: &Utf8Path) -> bool {
        self.covering.contains(path)
    }

    /// Returns the nearest covering directory that absorbs `path`.
    #[must_use]
    pub fn covering_ancestor<'a>(
        &self,
        path: &'a Utf8Path,
        is_dir: bool,
    ) -> Option<&'a Utf8Path> {
        let ancestors = path.ancestors().skip(1);
        let limit = match self.depth {
            CoverageDepth::Recursive => usize::MAX,
            CoverageDepth::Children if is_dir => 0,
            CoverageDepth::Children => 1,
        };
        ancestors
            .take(limit)
            .find(|ancestor| self.covering.contains(*ancestor))
    }

    /// Returns `true` if `path` is active or absorbed by a covering directory.
    #[must_use]
    pub fn is_covered(&self, path: &Utf8Path, is_dir: bool) -> bool {
        self.is_active(path) || self.covering_ancestor(path, is_dir).is_some()
    }

    /// Records that `path` now holds a low-level watch.
    pub fn activate(&mut self, path: &Utf8Path) -> bool {
        self.active.insert(path.to_owned())
    }

    /// Forgets `path`'s low-level watch, and its covering mark with it.
    pub fn deactivate(&mut self, path: &Utf8Path) -> bool {
        self.covering.remove(path);
        self.active.remove(path)
    }

    /// Marks `dir` as covering its descendants.
    pub fn mark_covering(&mut self, dir: &Utf8Path) -> bool {
        self.covering.insert(dir.to_owned())
    }

    /// Clears `dir`'s covering mark.
    pub fn unmark_covering(&mut self, dir: &Utf8Path) -> bool {
        self.covering.remove(dir)
    }

    /// Returns the active paths `dir`'s watch would reach.
    #[must_use]
    pub fn active_descendants(&self, dir: &Utf8Path) -> Vec<Utf8PathBuf> {
        self.active
            .iter()
            .filter(|path| self.depth.covers(dir, path))
            .cloned()
            .collect()
    }

    /// Iterates over active paths in arbitrary order.
    pub fn active(&self) -> impl Iterator<Item = &Utf8Path> {
        self.active.iter().map(Utf8PathBuf::as_path)
    }

    /// Iterates over covering directories in arbitrary order.
    pub fn covering(&self) -> impl Iterator<Item = &Utf8Path> {
        self.covering.iter().map(Utf8PathBuf::as_path)
    }

    /// Returns the number of active low-level watches.
    #[inline]
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_is_segment_based() {
        let depth = CoverageDepth::Recursive;
        assert!(depth.covers(Utf8Path::new("a"), Utf8Path::new("a/b")));
        assert!(depth.covers(Utf8Path::new("a"), Utf8Path::new("a/b/c")));
        assert!(!depth.covers(Utf8Path::new("a"), Utf8Path::new("a")));
        assert!(!depth.covers(Utf8Path::new("a"), Utf8Path::new("ab/c")));
        assert!(!depth.covers(Utf8Path::new("a/b"), Utf8Path::new("a")));
    }

    #[test]
    fn test_covers_children_only() {
        let depth = CoverageDepth::Children;
        assert!(depth.covers(Utf8Path::new("a"), Utf8Path::new("a/b")));
        assert!(!depth.covers(Utf8Path::new("a"), Utf8Path::new("a/b/c")));
    }

    #[test]
    fn test_from_recursive() {
        assert_eq!(CoverageDepth::from_recursive(true), CoverageDepth::Recursive);
        assert_eq!(CoverageDepth::from_recursive(false), CoverageDepth::Children);
        assert!(CoverageDepth::Recursive.is_recursive());
    }

    #[test]
    fn test_active_path_is_covered() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Recursive);
        tracker.activate(Utf8Path::new("a/x.txt"));
        assert!(tracker.is_covered(Utf8Path::new("a/x.txt"), false));
        assert!(!tracker.is_covered(Utf8Path::new("a/y.txt"), false));
    }

    #[test]
    fn test_covering_ancestor_covers_descendants() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Recursive);
        tracker.activate(Utf8Path::new("a"));
        tracker.mark_covering(Utf8Path::new("a"));

        assert_eq!(
            tracker.covering_ancestor(Utf8Path::new("a/b/c.txt"), false),
            Some(Utf8Path::new("a"))
        );
        assert!(tracker.is_covered(Utf8Path::new("a/x.txt"), false));
        assert!(!tracker.is_covered(Utf8Path::new("b/x.txt"), false));
    }

    #[test]
    fn test_active_but_not_covering_does_not_cover() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Recursive);
        tracker.activate(Utf8Path::new("a"));
        assert!(!tracker.is_covered(Utf8Path::new("a/x.txt"), false));
    }

    #[test]
    fn test_children_depth_limits_ancestor_search() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Children);
        tracker.activate(Utf8Path::new("a"));
        tracker.mark_covering(Utf8Path::new("a"));

        assert!(tracker.is_covered(Utf8Path::new("a/x.txt"), false));
        assert!(!tracker.is_covered(Utf8Path::new("a/b/x.txt"), false));
    }

    #[test]
    fn test_children_depth_never_absorbs_directories() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Children);
        tracker.activate(Utf8Path::new("a"));
        tracker.mark_covering(Utf8Path::new("a"));

        assert!(tracker.is_covered(Utf8Path::new("a/b"), false));
        assert!(!tracker.is_covered(Utf8Path::new("a/b"), true));
        assert_eq!(tracker.covering_ancestor(Utf8Path::new("a/b"), true), None);
    }

    #[test]
    fn test_recursive_depth_absorbs_directories() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Recursive);
        tracker.activate(Utf8Path::new("a"));
        tracker.mark_covering(Utf8Path::new("a"));

        assert!(tracker.is_covered(Utf8Path::new("a/b"), true));
        assert!(tracker.is_covered(Utf8Path::new("a/b/c"), true));
    }

    #[test]
    fn test_deactivate_clears_covering() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Recursive);
        tracker.activate(Utf8Path::new("a"));
        tracker.mark_covering(Utf8Path::new("a"));

        assert!(tracker.deactivate(Utf8Path::new("a")));
        assert!(!tracker.is_active(Utf8Path::new("a")));
        assert!(!tracker.is_covering(Utf8Path::new("a")));
        assert!(!tracker.deactivate(Utf8Path::new("a")));
    }

    #[test]
    fn test_active_descendants() {
        let mut tracker = CoverageTracker::new(CoverageDepth::Recursive);
        tracker.activate(Utf8Path::new("a/x.txt"));
        tracker.activate(Utf8Path::new("a/b/y.txt"));
        tracker.activate(Utf8Path::new("b/z.txt"));

        let mut found = tracker.active_descendants(Utf8Path::new("a"));
        found.sort();
        assert_eq!(found, vec!["a/b/y.txt", "a/x.txt"]);
    }
}
