//! Output collections for live filters.

use std::collections::{BTreeMap, BTreeSet};

/// Where a live filter keeps the rows that pass its predicate.
pub trait FilterStorage<K, T> {
    /// What [`FilterStorage::snapshot`] returns.
    type Snapshot;

    /// Adds or replaces a row.
    fn set(&mut self, key: K, row: T);

    /// Moves a row from `old_key` to `new_key` with new content.
    fn update(&mut self, old_key: &K, new_key: K, row: T) {
        // delete first: the keys may be equal
        self.delete(old_key);
        self.set(new_key, row);
    }

    /// Removes a row; absent keys are ignored.
    fn delete(&mut self, key: &K);

    /// Removes every row.
    fn clear(&mut self);

    /// Number of rows.
    fn len(&self) -> usize;

    /// Returns true if there are no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is present.
    fn contains(&self, key: &K) -> bool;

    /// A copy of the current contents.
    fn snapshot(&self) -> Self::Snapshot;
}

/// Keyed map output, ordered by key.
#[derive(Debug, Clone)]
pub struct MapStorage<K, T> {
    rows: BTreeMap<K, T>,
}

impl<K, T> Default for MapStorage<K, T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<K: Ord, T> MapStorage<K, T> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a row.
    pub fn get(&self, key: &K) -> Option<&T> {
        self.rows.get(key)
    }

    /// Iterates rows in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.rows.iter()
    }
}

impl<K: Ord + Clone, T: Clone> FilterStorage<K, T> for MapStorage<K, T> {
    type Snapshot = BTreeMap<K, T>;

    fn set(&mut self, key: K, row: T) {
        self.rows.insert(key, row);
    }

    fn delete(&mut self, key: &K) {
        self.rows.remove(key);
    }

    fn clear(&mut self) {
        self.rows.clear();
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.rows.clone()
    }
}

/// Keyed entries in insertion order.
///
/// Replacing a row keeps its position; moving it to another key (or deleting
/// and re-adding it) puts it at the end.
#[derive(Debug, Clone)]
pub struct EntryStorage<K, T> {
    entries: Vec<(K, T)>,
}

impl<K, T> Default for EntryStorage<K, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq, T> EntryStorage<K, T> {
    /// Creates an empty entry list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a row.
    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[(K, T)] {
        &self.entries
    }
}

impl<K: PartialEq + Clone, T: Clone> FilterStorage<K, T> for EntryStorage<K, T> {
    type Snapshot = Vec<(K, T)>;

    fn set(&mut self, key: K, row: T) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = row,
            None => self.entries.push((key, row)),
        }
    }

    fn delete(&mut self, key: &K) {
        self.entries.retain(|(k, _)| k != key);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.entries.clone()
    }
}

/// A flat set of the keys that pass; rows are not kept.
#[derive(Debug, Clone)]
pub struct KeySetStorage<K> {
    keys: BTreeSet<K>,
}

impl<K> Default for KeySetStorage<K> {
    fn default() -> Self {
        Self {
            keys: BTreeSet::new(),
        }
    }
}

impl<K: Ord> KeySetStorage<K> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }
}

impl<K: Ord + Clone, T> FilterStorage<K, T> for KeySetStorage<K> {
    type Snapshot = BTreeSet<K>;

    fn set(&mut self, key: K, _row: T) {
        self.keys.insert(key);
    }

    fn delete(&mut self, key: &K) {
        self.keys.remove(key);
    }

    fn clear(&mut self) {
        self.keys.clear();
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_update_moves_key() {
        let mut map = MapStorage::new();
        map.set(1, "a");
        map.update(&1, 2, "b");
        assert!(!map.contains(&1));
        assert_eq!(map.get(&2), Some(&"b"));

        map.update(&2, 2, "c");
        assert_eq!(FilterStorage::<i32, &str>::len(&map), 1);
        assert_eq!(map.get(&2), Some(&"c"));
    }

    #[test]
    fn entries_keep_insertion_order() {
        let mut entries = EntryStorage::new();
        entries.set("b", 1);
        entries.set("a", 2);
        entries.set("b", 3);
        assert_eq!(entries.snapshot(), vec![("b", 3), ("a", 2)]);

        entries.update(&"b", "c", 4);
        assert_eq!(entries.snapshot(), vec![("a", 2), ("c", 4)]);

        entries.delete(&"missing");
        assert_eq!(entries.entries().len(), 2);
    }

    #[test]
    fn key_set_ignores_rows() {
        let mut keys = KeySetStorage::new();
        FilterStorage::<u32, String>::set(&mut keys, 7, "row".to_string());
        FilterStorage::<u32, String>::update(&mut keys, &7, 8, "row".to_string());
        assert!(FilterStorage::<u32, String>::contains(&keys, &8));
        assert_eq!(keys.iter().copied().collect::<Vec<_>>(), vec![8]);

        FilterStorage::<u32, String>::clear(&mut keys);
        assert!(FilterStorage::<u32, String>::is_empty(&keys));
    }
}
