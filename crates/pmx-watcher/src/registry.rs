//! Path to subscriber registry.
//!
//! [`WatchRegistry`] records who asked to be notified about which path. It
//! knows nothing about low-level watches; that is the coverage tracker's job.
//!
//! A key is present if and only if its subscriber list is non-empty: removing
//! the last subscriber prunes the entry immediately.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use pmx_core::{FxHashMap, fx_hash_map};
use smallvec::SmallVec;

use crate::coverage::CoverageDepth;
use crate::subscriber::{SubscriberRef, same_subscriber};

/// Subscribers of one path, in registration order.
///
/// Most paths have one or two subscribers, so the list lives inline.
pub type SubscriberList = SmallVec<[SubscriberRef; 2]>;

#[derive(Clone)]
struct WatchEntry {
    subscribers: SubscriberList,
    is_dir: bool,
}

/// Mapping from watched path to its ordered subscriber list.
///
/// Duplicate registrations of the same subscriber are kept; each one is
/// notified separately and removed separately.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    entries: FxHashMap<Utf8PathBuf, WatchEntry>,
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (path, entry) in &self.entries {
            map.entry(path, &entry.subscribers.len());
        }
        map.finish()
    }
}

impl WatchRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: fx_hash_map(),
        }
    }

    /// Appends `subscriber` to the list for `path`, creating it if absent.
    ///
    /// `is_dir` records whether the path was a directory when last watched;
    /// it is needed later to restore the right kind of low-level watch.
    pub fn add(&mut self, path: &Utf8Path, subscriber: SubscriberRef, is_dir: bool) {
        let entry = self
            .entries
            .entry(path.to_owned())
            .or_insert_with(|| WatchEntry {
                subscribers: SubscriberList::new(),
                is_dir,
            });
        entry.is_dir = is_dir;
        entry.subscribers.push(subscriber);
    }

    /// Removes subscribers of `path` and returns the ones removed.
    ///
    /// `None` is the wildcard: the whole entry goes. `Some` removes only the
    /// first registration of that exact subscriber; the entry is pruned if
    /// that empties it. Unknown paths or subscribers remove nothing.
    pub fn remove(
        &mut self,
        path: &Utf8Path,
        subscriber: Option<&SubscriberRef>,
    ) -> SubscriberList {
        let Some(target) = subscriber else {
            return self
                .entries
                .remove(path)
                .map(|entry| entry.subscribers)
                .unwrap_or_default();
        };

        let Some(entry) = self.entries.get_mut(path) else {
            return SubscriberList::new();
        };

        let mut removed = SubscriberList::new();
        if let Some(index) = entry
            .subscribers
            .iter()
            .position(|s| same_subscriber(s, target))
        {
            removed.push(entry.subscribers.remove(index));
        }

        if entry.subscribers.is_empty() {
            self.entries.remove(path);
        }

        removed
    }

    /// Returns the subscribers of `path` in registration order.
    ///
    /// Empty for unknown paths.
    #[must_use]
    pub fn subscribers_of(&self, path: &Utf8Path) -> &[SubscriberRef] {
        self.entries
            .get(path)
            .map(|entry| entry.subscribers.as_slice())
            .unwrap_or_default()
    }

    /// Returns a cloned handle list, for invoking callbacks after the lock drops.
    #[must_use]
    pub fn subscribers_cloned(&self, path: &Utf8Path) -> SubscriberList {
        self.subscribers_of(path).iter().map(Arc::clone).collect()
    }

    /// Returns `true` if `path` has at least one subscriber.
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns `true` if `path` is registered and was a directory when watched.
    #[must_use]
    pub fn is_dir(&self, path: &Utf8Path) -> bool {
        self.entries.get(path).is_some_and(|entry| entry.is_dir)
    }

    /// Returns every registered path strictly below `dir`, with its directory flag.
    #[must_use]
    pub fn descendants_of(
        &self,
        dir: &Utf8Path,
        depth: CoverageDepth,
    ) -> Vec<(Utf8PathBuf, bool)> {
        self.entries
            .iter()
            .filter(|(path, _)| depth.covers(dir, path))
            .map(|(path, entry)| (path.clone(), entry.is_dir))
            .collect()
    }

    /// Iterates over registered paths with their subscriber counts.
    pub fn iter(&self) -> impl Iterator<Item = (&Utf8Path, usize)> {
        self.entries
            .iter()
            .map(|(path, entry)| (path.as_path(), entry.subscribers.len()))
    }

    /// Returns the number of registered paths.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no path is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::ChannelSubscriber;

    fn subscriber() -> SubscriberRef {
        ChannelSubscriber::channel().0
    }

    #[test]
    fn test_add_creates_entry() {
        let mut registry = WatchRegistry::new();
        let sub = subscriber();
        registry.add(Utf8Path::new("test"), Arc::clone(&sub), false);

        let subs = registry.subscribers_of(Utf8Path::new("test"));
        assert_eq!(subs.len(), 1);
        assert!(same_subscriber(&subs[0], &sub));
    }

    #[test]
    fn test_add_preserves_order() {
        let mut registry = WatchRegistry::new();
        let (a, b) = (subscriber(), subscriber());
        registry.add(Utf8Path::new("a/x.txt"), Arc::clone(&a), false);
        registry.add(Utf8Path::new("a/x.txt"), Arc::clone(&b), false);

        let subs = registry.subscribers_of(Utf8Path::new("a/x.txt"));
        assert!(same_subscriber(&subs[0], &a));
        assert!(same_subscriber(&subs[1], &b));
    }

    #[test]
    fn test_remove_wildcard_removes_entry() {
        let mut registry = WatchRegistry::new();
        let path = Utf8Path::new("a/x.txt");
        registry.add(path, subscriber(), false);
        registry.add(path, subscriber(), false);

        let removed = registry.remove(path, None);
        assert_eq!(removed.len(), 2);
        assert!(!registry.contains(path));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_one_keeps_others() {
        let mut registry = WatchRegistry::new();
        let path = Utf8Path::new("a/x.txt");
        let (a, b) = (subscriber(), subscriber());
        registry.add(path, Arc::clone(&a), false);
        registry.add(path, Arc::clone(&b), false);

        let removed = registry.remove(path, Some(&a));
        assert_eq!(removed.len(), 1);
        let subs = registry.subscribers_of(path);
        assert_eq!(subs.len(), 1);
        assert!(same_subscriber(&subs[0], &b));
    }

    #[test]
    fn test_remove_last_prunes_entry() {
        let mut registry = WatchRegistry::new();
        let path = Utf8Path::new("a/x.txt");
        let a = subscriber();
        registry.add(path, Arc::clone(&a), false);

        registry.remove(path, Some(&a));
        assert!(!registry.contains(path));
    }

    #[test]
    fn test_remove_duplicate_removes_first_only() {
        let mut registry = WatchRegistry::new();
        let path = Utf8Path::new("a/x.txt");
        let a = subscriber();
        registry.add(path, Arc::clone(&a), false);
        registry.add(path, Arc::clone(&a), false);

        registry.remove(path, Some(&a));
        assert_eq!(registry.subscribers_of(path).len(), 1);
    }

    #[test]
    fn test_remove_unknown_subscriber_is_noop() {
        let mut registry = WatchRegistry::new();
        let path = Utf8Path::new("a/x.txt");
        registry.add(path, subscriber(), false);

        let removed = registry.remove(path, Some(&subscriber()));
        assert!(removed.is_empty());
        assert_eq!(registry.subscribers_of(path).len(), 1);
    }

    #[test]
    fn test_subscribers_of_unknown_is_empty() {
        let registry = WatchRegistry::new();
        assert!(registry.subscribers_of(Utf8Path::new("nope")).is_empty());
    }

    #[test]
    fn test_descendants_of_respects_depth() {
        let mut registry = WatchRegistry::new();
        registry.add(Utf8Path::new("a"), subscriber(), true);
        registry.add(Utf8Path::new("a/x.txt"), subscriber(), false);
        registry.add(Utf8Path::new("a/b"), subscriber(), true);
        registry.add(Utf8Path::new("a/b/y.txt"), subscriber(), false);
        registry.add(Utf8Path::new("ab/z.txt"), subscriber(), false);

        let mut recursive: Vec<_> = registry
            .descendants_of(Utf8Path::new("a"), CoverageDepth::Recursive)
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        recursive.sort();
        assert_eq!(recursive, vec!["a/b", "a/b/y.txt", "a/x.txt"]);

        let mut children: Vec<_> = registry
            .descendants_of(Utf8Path::new("a"), CoverageDepth::Children)
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        children.sort();
        assert_eq!(children, vec!["a/b", "a/x.txt"]);
    }

    #[test]
    fn test_is_dir_tracks_latest_registration() {
        let mut registry = WatchRegistry::new();
        registry.add(Utf8Path::new("a"), subscriber(), true);
        assert!(registry.is_dir(Utf8Path::new("a")));
        assert!(!registry.is_dir(Utf8Path::new("b")));
    }
}
