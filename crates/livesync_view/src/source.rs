//! Event sources that drive live filters.
//!
//! A live filter learns about source changes through an [`EventSource`]: it
//! hands the source one handler per event kind and gets back an optional
//! [`Registration`] that removes the handler again. Sources need not support
//! every kind; the default methods register nothing.
//!
//! [`EventHub`] is a manually driven source, useful when the source
//! collection is not a reconciled table.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Called with the key and row of an inserted row.
pub type InsertHandler<K, T> = Box<dyn Fn(&K, &T) + Send + Sync>;

/// Called with the old key, new key and new row of an updated row.
pub type UpdateHandler<K, T> = Box<dyn Fn(&K, &K, &T) + Send + Sync>;

/// Called with the key of a deleted row.
pub type DeleteHandler<K> = Box<dyn Fn(&K) + Send + Sync>;

/// Called when the whole source was replaced.
pub type RefetchHandler = Box<dyn Fn() + Send + Sync>;

/// Removes a previously registered handler.
pub type Registration = Box<dyn FnOnce() + Send>;

/// A feed of fine-grained changes to a keyed source collection.
pub trait EventSource<K, T>: Send + Sync {
    /// Registers an insert handler.
    fn register_insert(&self, _handler: InsertHandler<K, T>) -> Option<Registration> {
        None
    }

    /// Registers an update handler.
    fn register_update(&self, _handler: UpdateHandler<K, T>) -> Option<Registration> {
        None
    }

    /// Registers a delete handler.
    fn register_delete(&self, _handler: DeleteHandler<K>) -> Option<Registration> {
        None
    }

    /// Registers a refetch handler.
    fn register_refetch(&self, _handler: RefetchHandler) -> Option<Registration> {
        None
    }

    /// Teardown hook run once when the filter is disposed.
    fn cleanup(&self) {}
}

struct Listeners<F: ?Sized> {
    list: Mutex<Vec<(u64, Arc<F>)>>,
}

impl<F: ?Sized> Listeners<F> {
    fn new() -> Self {
        Self {
            list: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, id: u64, callback: Arc<F>) {
        self.list.lock().push((id, callback));
    }

    fn remove(&self, id: u64) {
        self.list.lock().retain(|(lid, _)| *lid != id);
    }

    /// Snapshot taken under the lock; callbacks run without it.
    fn snapshot(&self) -> Vec<Arc<F>> {
        self.list.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }

    fn len(&self) -> usize {
        self.list.lock().len()
    }
}

type InsertFn<K, T> = dyn Fn(&K, &T) + Send + Sync;
type UpdateFn<K, T> = dyn Fn(&K, &K, &T) + Send + Sync;
type DeleteFn<K> = dyn Fn(&K) + Send + Sync;
type RefetchFn = dyn Fn() + Send + Sync;

struct Hub<K, T> {
    inserts: Listeners<InsertFn<K, T>>,
    updates: Listeners<UpdateFn<K, T>>,
    deletes: Listeners<DeleteFn<K>>,
    refetches: Listeners<RefetchFn>,
    next_id: AtomicU64,
    cleanups: AtomicUsize,
}

/// A manually driven [`EventSource`].
///
/// Clones share the same listeners, so one clone can be handed to a filter
/// while another emits.
pub struct EventHub<K, T> {
    hub: Arc<Hub<K, T>>,
}

impl<K, T> Clone for EventHub<K, T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<K, T> Default for EventHub<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> EventHub<K, T> {
    /// Creates a hub with no listeners.
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Hub {
                inserts: Listeners::new(),
                updates: Listeners::new(),
                deletes: Listeners::new(),
                refetches: Listeners::new(),
                next_id: AtomicU64::new(1),
                cleanups: AtomicUsize::new(0),
            }),
        }
    }

    /// Emits an insert.
    pub fn emit_insert(&self, key: &K, row: &T) {
        for cb in self.hub.inserts.snapshot() {
            cb(key, row);
        }
    }

    /// Emits an update.
    pub fn emit_update(&self, old_key: &K, new_key: &K, row: &T) {
        for cb in self.hub.updates.snapshot() {
            cb(old_key, new_key, row);
        }
    }

    /// Emits a delete.
    pub fn emit_delete(&self, key: &K) {
        for cb in self.hub.deletes.snapshot() {
            cb(key);
        }
    }

    /// Emits a refetch signal.
    pub fn emit_refetch(&self) {
        for cb in self.hub.refetches.snapshot() {
            cb();
        }
    }

    /// Total number of registered handlers across all kinds.
    pub fn listener_count(&self) -> usize {
        self.hub.inserts.len() + self.hub.updates.len() + self.hub.deletes.len() + self.hub.refetches.len()
    }

    /// How many times a consumer ran the cleanup hook.
    pub fn cleanup_count(&self) -> usize {
        self.hub.cleanups.load(Ordering::Relaxed)
    }

    fn next_id(&self) -> u64 {
        self.hub.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn registration<K, T, F>(hub: &Arc<Hub<K, T>>, id: u64, pick: F) -> Registration
where
    K: 'static,
    T: 'static,
    F: Fn(&Hub<K, T>, u64) + Send + 'static,
{
    let weak: Weak<Hub<K, T>> = Arc::downgrade(hub);
    Box::new(move || {
        if let Some(hub) = weak.upgrade() {
            pick(&hub, id);
        }
    })
}

impl<K: 'static, T: 'static> EventSource<K, T> for EventHub<K, T> {
    fn register_insert(&self, handler: InsertHandler<K, T>) -> Option<Registration> {
        let id = self.next_id();
        self.hub.inserts.add(id, Arc::from(handler));
        Some(registration(&self.hub, id, |hub, id| hub.inserts.remove(id)))
    }

    fn register_update(&self, handler: UpdateHandler<K, T>) -> Option<Registration> {
        let id = self.next_id();
        self.hub.updates.add(id, Arc::from(handler));
        Some(registration(&self.hub, id, |hub, id| hub.updates.remove(id)))
    }

    fn register_delete(&self, handler: DeleteHandler<K>) -> Option<Registration> {
        let id = self.next_id();
        self.hub.deletes.add(id, Arc::from(handler));
        Some(registration(&self.hub, id, |hub, id| hub.deletes.remove(id)))
    }

    fn register_refetch(&self, handler: RefetchHandler) -> Option<Registration> {
        let id = self.next_id();
        self.hub.refetches.add(id, Arc::from(handler));
        Some(registration(&self.hub, id, |hub, id| hub.refetches.remove(id)))
    }

    fn cleanup(&self) {
        self.hub.cleanups.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_registered_handlers() {
        let hub: EventHub<u32, String> = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let reg = hub
            .register_insert(Box::new(move |k: &u32, v: &String| sink.lock().push((*k, v.clone()))))
            .unwrap();
        hub.emit_insert(&1, &"a".to_string());
        assert_eq!(hub.listener_count(), 1);

        reg();
        hub.emit_insert(&2, &"b".to_string());
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(*seen.lock(), vec![(1, "a".to_string())]);
    }

    #[test]
    fn default_methods_register_nothing() {
        struct Silent;
        impl EventSource<u32, u32> for Silent {}

        assert!(Silent.register_insert(Box::new(|_: &u32, _: &u32| {})).is_none());
        assert!(Silent.register_refetch(Box::new(|| {})).is_none());
    }
}
