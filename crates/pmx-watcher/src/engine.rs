//! Watch deduplication.
//!
//! [`WatchState`] is the single block of shared state: the subscriber
//! registry plus the coverage tracker. It decides, on every watch and
//! unwatch, which paths need a real low-level watch and which can lean on a
//! covering ancestor directory, and it resolves raw events to the subscribers
//! that should hear about them.
//!
//! # Flush and restore
//!
//! ```text
//!  watch("a/x.txt"), watch("a/y.txt")      watch("a")  (flush)
//!
//!  active:   a/x.txt  a/y.txt              active:   a
//!  covering: -                             covering: a
//!
//!                         unwatch("a")  (restore)
//!                         active:   a/x.txt  a/y.txt
//!                         covering: -
//! ```
//!
//! Individually watched files hand over to a directory only after the
//! directory's watch is in place, and get their own watches back before it
//! is removed. Descendant directory watches are the exception: they are
//! dropped before the directory's watch is added and restored after it is
//! removed, so the OS never holds two watches on one directory. All of it
//! happens under the state lock.
//!
//! With [`CoverageDepth::Children`] a directory watch reports only its direct
//! children, so a registered descendant directory keeps its own watch.

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::backend::WatchBackend;
use crate::coverage::{CoverageDepth, CoverageTracker};
use crate::error::WatchError;
use crate::events::{NotificationKind, RawEvent};
use crate::registry::{SubscriberList, WatchRegistry};
use crate::subscriber::{SubscriberRef, notify_subscriber};

/// Registry and coverage state guarded by the watcher's lock.
#[derive(Debug, Clone, Default)]
pub struct WatchState {
    registry: WatchRegistry,
    coverage: CoverageTracker,
}

impl WatchState {
    /// Creates empty state.
    #[must_use]
    pub fn new(depth: CoverageDepth) -> Self {
        Self {
            registry: WatchRegistry::new(),
            coverage: CoverageTracker::new(depth),
        }
    }

    /// The subscriber registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// The coverage tracker.
    #[inline]
    #[must_use]
    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    /// Registers `subscriber` for `path` and makes sure the path is covered.
    ///
    /// A path already covered only gains the registration. Otherwise the path
    /// takes its own low-level watch and, for a directory, the descendant
    /// watches it absorbs are flushed into it.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it refuses the watch. The registration
    /// is rolled back and any descendant watches already dropped are restored.
    pub fn watch(
        &mut self,
        backend: &dyn WatchBackend,
        path: &Utf8Path,
        subscriber: SubscriberRef,
        is_dir: bool,
    ) -> Result<(), WatchError> {
        self.registry.add(path, Arc::clone(&subscriber), is_dir);

        if self.coverage.is_active(path) {
            tracing::debug!(path = %path, "Path already holds a watch");
            return Ok(());
        }
        if let Some(ancestor) = self.coverage.covering_ancestor(path, is_dir) {
            tracing::debug!(path = %path, covered_by = %ancestor, "Path covered by ancestor");
            return Ok(());
        }

        let placed = if is_dir {
            self.establish_dir(backend, path)
        } else {
            self.establish(backend, path, false)
        };
        if let Err(err) = placed {
            self.registry.remove(path, Some(&subscriber));
            return Err(err);
        }

        tracing::debug!(path = %path, is_dir, "Watch added");
        Ok(())
    }

    /// Removes `subscriber` from `path`, or every subscriber when `None`.
    ///
    /// Once the last subscriber is gone the path is torn down: its own
    /// low-level watch is removed and, if it was covering, its remaining
    /// descendants get their own watches back. Removing a subscriber that is
    /// not registered for a watched path does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotWatched`] if `path` has no subscribers.
    pub fn unwatch(
        &mut self,
        backend: &dyn WatchBackend,
        path: &Utf8Path,
        subscriber: Option<&SubscriberRef>,
    ) -> Result<(), WatchError> {
        if !self.registry.contains(path) {
            return Err(WatchError::not_watched(path));
        }

        let removed = self.registry.remove(path, subscriber);
        if self.registry.contains(path) {
            tracing::debug!(
                path = %path,
                removed = removed.len(),
                remaining = self.registry.subscribers_of(path).len(),
                "Subscriber removed, path still watched"
            );
            return Ok(());
        }

        self.teardown(backend, path);
        tracing::debug!(path = %path, "Watch removed");
        Ok(())
    }

    /// Demotes every active descendant `dir` absorbs and marks `dir` covering.
    ///
    /// Registry entries are untouched. Returns how many watches were demoted.
    pub fn flush_dir(&mut self, backend: &dyn WatchBackend, dir: &Utf8Path) -> usize {
        let demoted = self.absorbed_active(dir, false);
        self.coverage.mark_covering(dir);

        for path in &demoted {
            self.remove_watch(backend, path);
        }

        if !demoted.is_empty() {
            tracing::debug!(dir = %dir, demoted = demoted.len(), "Flushed descendant watches");
        }
        demoted.len()
    }

    /// Gives `dir`'s registered descendants their own watches back and clears
    /// its covering mark.
    ///
    /// `dir`'s own low-level watch is left alone. Descendants are restored
    /// shallow-first, so a restored directory covers whatever lies below it.
    pub fn restore_dir(&mut self, backend: &dyn WatchBackend, dir: &Utf8Path) {
        self.coverage.unmark_covering(dir);
        let descendants = self.registry.descendants_of(dir, self.coverage.depth());
        let count = descendants.len();
        self.cover(backend, descendants);
        tracing::debug!(dir = %dir, descendants = count, "Restored descendant watches");
    }

    /// Drops `path`'s low-level watch. Registry entries are untouched.
    ///
    /// Returns `false` if `path` held no watch.
    pub fn remove_watch(&mut self, backend: &dyn WatchBackend, path: &Utf8Path) -> bool {
        if !self.coverage.deactivate(path) {
            return false;
        }
        if let Err(err) = backend.remove_watch(path) {
            tracing::warn!(path = %path, error = %err, "Failed to remove low-level watch");
        }
        true
    }

    /// Resolves a raw event to the subscribers that should hear about it.
    ///
    /// A registered path notifies its own subscribers. A creation directly
    /// under a registered directory whose children are reported notifies the
    /// directory's subscribers with the new child's path. Anything else is
    /// unroutable.
    #[must_use]
    pub fn resolve(&self, event: &RawEvent) -> Option<Dispatch> {
        let kind = event.kind.notification_kind();

        if self.registry.contains(&event.path) {
            return Some(Dispatch {
                kind,
                path: event.path.clone(),
                subscribers: self.registry.subscribers_cloned(&event.path),
            });
        }

        if !event.kind.introduces_path() {
            return None;
        }
        let parent = event.path.parent()?;
        if !self.registry.is_dir(parent) || !self.reports_children(parent) {
            return None;
        }

        Some(Dispatch {
            kind,
            path: event.path.clone(),
            subscribers: self.registry.subscribers_cloned(parent),
        })
    }

    /// Returns a sorted copy of the registry and coverage sets.
    #[must_use]
    pub fn snapshot(&self) -> WatchSnapshot {
        let watched = self
            .registry
            .iter()
            .map(|(path, count)| (path.to_owned(), count))
            .collect();

        let mut active: Vec<Utf8PathBuf> =
            self.coverage.active().map(Utf8Path::to_owned).collect();
        active.sort();

        let mut covering: Vec<Utf8PathBuf> =
            self.coverage.covering().map(Utf8Path::to_owned).collect();
        covering.sort();

        WatchSnapshot {
            watched,
            active,
            covering,
        }
    }

    /// Tears down `path`'s watch once nothing is registered for it.
    ///
    /// Files that only `path` covered get their watches back while `path`'s
    /// own watch still reports them; descendant directories, and the files
    /// they will cover, only once that watch is gone.
    fn teardown(&mut self, backend: &dyn WatchBackend, path: &Utf8Path) {
        if !self.coverage.unmark_covering(path) {
            self.remove_watch(backend, path);
            return;
        }

        let depth = self.coverage.depth();
        let (dirs, files): (Vec<_>, Vec<_>) = self
            .registry
            .descendants_of(path, depth)
            .into_iter()
            .partition(|(_, is_dir)| *is_dir);
        let (nested, direct): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|(file, _)| dirs.iter().any(|(dir, _)| depth.absorbs(dir, file, false)));

        let count = dirs.len() + nested.len() + direct.len();
        self.cover(backend, direct);
        self.remove_watch(backend, path);
        self.cover(backend, dirs.into_iter().chain(nested).collect());
        tracing::debug!(dir = %path, descendants = count, "Restored descendant watches");
    }

    fn establish(
        &mut self,
        backend: &dyn WatchBackend,
        path: &Utf8Path,
        is_dir: bool,
    ) -> Result<(), WatchError> {
        let recursive = is_dir && self.coverage.depth().is_recursive();
        backend.add_watch(path, recursive)?;
        self.coverage.activate(path);
        if is_dir {
            self.coverage.mark_covering(path);
        }
        Ok(())
    }

    /// Places a directory watch and flushes what it absorbs.
    ///
    /// The OS never holds two watches on one directory, so descendant
    /// directory watches are dropped before the directory's own watch is
    /// added. File watches are only dropped once that watch is in place.
    fn establish_dir(
        &mut self,
        backend: &dyn WatchBackend,
        dir: &Utf8Path,
    ) -> Result<(), WatchError> {
        for nested in self.absorbed_active(dir, true) {
            self.remove_watch(backend, &nested);
        }

        if let Err(err) = self.establish(backend, dir, true) {
            self.restore_dir(backend, dir);
            return Err(err);
        }
        self.flush_dir(backend, dir);
        Ok(())
    }

    /// Returns the active paths `dir` absorbs, or only the directories among them.
    fn absorbed_active(&self, dir: &Utf8Path, dirs_only: bool) -> Vec<Utf8PathBuf> {
        let depth = self.coverage.depth();
        self.coverage
            .active_descendants(dir)
            .into_iter()
            .filter(|path| {
                let is_dir = self.registry.is_dir(path);
                (is_dir || !dirs_only) && depth.absorbs(dir, path, is_dir)
            })
            .collect()
    }

    /// Gives each uncovered path its own watch, shallowest first.
    fn cover(&mut self, backend: &dyn WatchBackend, mut paths: Vec<(Utf8PathBuf, bool)>) {
        paths.sort_by_key(|(path, _)| path.components().count());

        for (path, is_dir) in paths {
            if self.coverage.is_covered(&path, is_dir) {
                continue;
            }
            let placed = if is_dir {
                self.establish_dir(backend, &path)
            } else {
                self.establish(backend, &path, false)
            };
            if let Err(err) = placed {
                tracing::warn!(path = %path, error = %err, "Failed to re-establish watch");
            }
        }
    }

    fn reports_children(&self, dir: &Utf8Path) -> bool {
        self.coverage.is_covering(dir)
            || (self.coverage.depth().is_recursive()
                && self.coverage.covering_ancestor(dir, true).is_some())
    }
}

/// A resolved event: the callback to fire, its argument, and who hears it.
#[derive(Clone)]
pub struct Dispatch {
    /// Which callback fires.
    pub kind: NotificationKind,
    /// The path passed to the callback.
    pub path: Utf8PathBuf,
    /// Subscribers to invoke, in registration order.
    pub subscribers: SubscriberList,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Dispatch {
    /// Invokes every subscriber in order and returns how many were called.
    pub fn deliver(&self) -> usize {
        for subscriber in &self.subscribers {
            notify_subscriber(subscriber.as_ref(), self.kind, &self.path);
        }
        self.subscribers.len()
    }
}

/// Point-in-time view of the watcher's state, sorted for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchSnapshot {
    /// Watched paths and their subscriber counts.
    pub watched: BTreeMap<Utf8PathBuf, usize>,
    /// Paths holding a low-level watch.
    pub active: Vec<Utf8PathBuf>,
    /// Directories covering their descendants.
    pub covering: Vec<Utf8PathBuf>,
}
