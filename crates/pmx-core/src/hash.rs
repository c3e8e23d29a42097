//! Fast hash map and hash set type aliases.
//!
//! The watch registry and coverage tracker are keyed by paths and are probed
//! on every raw event, so they use the Fx hash algorithm from `rustc-hash`
//! instead of the standard library's SipHash.
//!
//! # Examples
//!
//! ```
//! use pmx_core::{FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
//!
//! let mut map: FxHashMap<String, usize> = fx_hash_map();
//! map.insert("src/lib.rs".to_owned(), 1);
//!
//! let set: FxHashSet<&str> = fx_hash_set();
//! assert!(set.is_empty());
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
///
/// Not resistant to hash flooding; only internal, trusted keys go in here.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// Creates a new empty [`FxHashMap`].
#[inline]
#[must_use]
pub fn fx_hash_map<K, V>() -> FxHashMap<K, V> {
    FxHashMap::default()
}

/// Creates a new empty [`FxHashSet`].
#[inline]
#[must_use]
pub fn fx_hash_set<V>() -> FxHashSet<V> {
    FxHashSet::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_hash_map_path_keys() {
        let mut map: FxHashMap<String, usize> = fx_hash_map();
        map.insert("a/x.txt".to_owned(), 1);
        map.insert("a/y.txt".to_owned(), 2);
        assert_eq!(map.get("a/x.txt"), Some(&1));
        assert_eq!(map.get("a"), None);
    }

    #[test]
    fn test_fx_hash_set_operations() {
        let mut set: FxHashSet<&str> = fx_hash_set();
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
        assert!(set.contains("a"));
    }
}
