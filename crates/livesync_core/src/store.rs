//! Per-connection table snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use livesync_codec::{DomainValue, RowKey};
use parking_lot::RwLock;

/// Decoded rows of one table, keyed by row key.
pub type TableSnapshot = BTreeMap<RowKey, Arc<DomainValue>>;

/// The canonical client-side copy of every subscribed table.
///
/// A store belongs to one client connection. Readers get cheap copies
/// (rows are reference counted); only the reconciler mutates it.
#[derive(Debug, Default)]
pub struct ClientStore {
    tables: RwLock<BTreeMap<String, TableSnapshot>>,
}

impl ClientStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of `table` in key order.
    pub fn rows(&self, table: &str) -> Vec<(RowKey, Arc<DomainValue>)> {
        self.tables
            .read()
            .get(table)
            .map(|snapshot| {
                snapshot
                    .iter()
                    .map(|(k, v)| (k.clone(), Arc::clone(v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A copy of the snapshot of `table`.
    pub fn snapshot(&self, table: &str) -> TableSnapshot {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Looks up a single row.
    pub fn get(&self, table: &str, key: &RowKey) -> Option<Arc<DomainValue>> {
        self.tables
            .read()
            .get(table)
            .and_then(|snapshot| snapshot.get(key))
            .cloned()
    }

    /// Returns true if the row exists.
    pub fn contains(&self, table: &str, key: &RowKey) -> bool {
        self.tables
            .read()
            .get(table)
            .is_some_and(|snapshot| snapshot.contains_key(key))
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    /// Names of every table that has received rows.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Runs `f` with exclusive access to one table's snapshot.
    pub(crate) fn with_table_mut<R>(&self, table: &str, f: impl FnOnce(&mut TableSnapshot) -> R) -> R {
        let mut tables = self.tables.write();
        let snapshot = tables.entry(table.to_string()).or_default();
        f(snapshot)
    }

    /// Replaces a table wholesale.
    pub(crate) fn replace(&self, table: &str, snapshot: TableSnapshot) {
        self.tables.write().insert(table.to_string(), snapshot);
    }

    /// Drops every table.
    pub fn clear(&self) {
        self.tables.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_store() {
        let store = ClientStore::new();
        assert_eq!(store.count("Message"), 0);
        assert!(store.rows("Message").is_empty());
        assert!(store.table_names().is_empty());
    }

    #[test]
    fn mutate_and_read() {
        let store = ClientStore::new();
        let key = RowKey::from_raw(&json!(1));
        store.with_table_mut("Message", |t| {
            t.insert(key.clone(), Arc::new(DomainValue::from("hi")));
        });

        assert_eq!(store.count("Message"), 1);
        assert!(store.contains("Message", &key));
        assert_eq!(
            store.get("Message", &key).as_deref(),
            Some(&DomainValue::from("hi"))
        );
        assert_eq!(store.table_names(), vec!["Message".to_string()]);

        store.replace("Message", TableSnapshot::new());
        assert_eq!(store.count("Message"), 0);

        store.clear();
        assert!(store.table_names().is_empty());
    }
}
