//! Change feed for observing reconciled row changes.
//!
//! The reconciler emits one [`ChangeEvent`] per logical change, in batch
//! order, after the table snapshot has been updated. The feed:
//! - Assigns each event a monotonically increasing sequence number
//! - Keeps a bounded history for polling
//! - Dispatches synchronously to listeners filtered by kind and table
//!
//! Listeners run with no feed or store lock held, so they may read the store
//! or register and remove listeners from inside a callback.
//!
//! # Usage
//!
//! ```
//! use livesync_core::{ChangeEvent, ChangeFeed};
//! use livesync_codec::{DomainValue, RowKey};
//! use std::sync::Arc;
//! use serde_json::json;
//!
//! let feed = ChangeFeed::new();
//! let sub = feed.on_insert(Some("Message"), |event| {
//!     println!("new message: {:?}", event.new_value);
//! });
//!
//! feed.emit(ChangeEvent::insert(
//!     "Message",
//!     RowKey::from_raw(&json!([1, "hi"])),
//!     Arc::new(DomainValue::from("hi")),
//! ));
//! sub.unsubscribe();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use livesync_codec::{DomainValue, RowKey};
use parking_lot::{Mutex, RwLock};

use crate::config::DEFAULT_MAX_HISTORY;

/// Kind of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Row appeared (no previous version known).
    Insert,
    /// Row with the same primary key changed content.
    Update,
    /// Row disappeared.
    Delete,
    /// The whole table was replaced; views must recompute from the store.
    Refetch,
}

impl ChangeKind {
    /// Lowercase name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
            ChangeKind::Refetch => "refetch",
        }
    }
}

/// A single change event from the change feed.
///
/// `Insert` has no old value, `Delete` has no new value and `Update` has
/// both. A `Delete` of a row that was never observed carries no old value
/// either. `Refetch` carries neither keys nor values.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Sequence number assigned by the feed; zero until emitted.
    pub sequence: u64,
    /// Type of change.
    pub kind: ChangeKind,
    /// Table the row belongs to.
    pub table: String,
    /// Row key before the change.
    pub old_key: Option<RowKey>,
    /// Row key after the change.
    pub new_key: Option<RowKey>,
    /// Decoded row before the change.
    pub old_value: Option<Arc<DomainValue>>,
    /// Decoded row after the change.
    pub new_value: Option<Arc<DomainValue>>,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(table: impl Into<String>, key: RowKey, value: Arc<DomainValue>) -> Self {
        Self {
            sequence: 0,
            kind: ChangeKind::Insert,
            table: table.into(),
            old_key: None,
            new_key: Some(key),
            old_value: None,
            new_value: Some(value),
        }
    }

    /// Creates an update event.
    pub fn update(
        table: impl Into<String>,
        old_key: RowKey,
        new_key: RowKey,
        old_value: Arc<DomainValue>,
        new_value: Arc<DomainValue>,
    ) -> Self {
        Self {
            sequence: 0,
            kind: ChangeKind::Update,
            table: table.into(),
            old_key: Some(old_key),
            new_key: Some(new_key),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    /// Creates a delete event.
    pub fn delete(table: impl Into<String>, key: RowKey, old_value: Option<Arc<DomainValue>>) -> Self {
        Self {
            sequence: 0,
            kind: ChangeKind::Delete,
            table: table.into(),
            old_key: Some(key),
            new_key: None,
            old_value,
            new_value: None,
        }
    }

    /// Creates a refetch signal for a table.
    pub fn refetch(table: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: ChangeKind::Refetch,
            table: table.into(),
            old_key: None,
            new_key: None,
            old_value: None,
            new_value: None,
        }
    }

    /// The key the row lives under after this event, or before it for deletes.
    pub fn key(&self) -> Option<&RowKey> {
        self.new_key.as_ref().or(self.old_key.as_ref())
    }
}

/// Identifier of a registered listener.
pub type ListenerId = u64;

/// Closure type for change listeners.
pub type ListenerFn = dyn Fn(&ChangeEvent) + Send + Sync;

struct Listener {
    id: ListenerId,
    kind: Option<ChangeKind>,
    table: Option<String>,
    callback: Arc<ListenerFn>,
}

impl Listener {
    fn matches(&self, event: &ChangeEvent) -> bool {
        self.kind.is_none_or(|k| k == event.kind)
            && self.table.as_deref().is_none_or(|t| t == event.table)
    }
}

type ListenerList = Mutex<Vec<Listener>>;

/// Handle returned when registering a listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: ListenerId,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// Removes the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|l| l.id != self.id);
        }
    }

    /// The listener's id.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// A change feed that distributes reconciled changes to listeners.
pub struct ChangeFeed {
    listeners: Arc<ListenerList>,
    history: RwLock<VecDeque<ChangeEvent>>,
    max_history: usize,
    next_sequence: AtomicU64,
    next_listener: AtomicU64,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            history: RwLock::new(VecDeque::new()),
            max_history,
            next_sequence: AtomicU64::new(1),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Listens for inserts, on one table or on all tables.
    pub fn on_insert(
        &self,
        table: Option<&str>,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Some(ChangeKind::Insert), table, callback)
    }

    /// Listens for updates.
    pub fn on_update(
        &self,
        table: Option<&str>,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Some(ChangeKind::Update), table, callback)
    }

    /// Listens for deletes.
    pub fn on_delete(
        &self,
        table: Option<&str>,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Some(ChangeKind::Delete), table, callback)
    }

    /// Listens for refetch signals.
    pub fn on_refetch(
        &self,
        table: Option<&str>,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Some(ChangeKind::Refetch), table, callback)
    }

    /// Listens for every event kind.
    pub fn on_change(
        &self,
        table: Option<&str>,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(None, table, callback)
    }

    fn register(
        &self,
        kind: Option<ChangeKind>,
        table: Option<&str>,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Listener {
            id,
            kind,
            table: table.map(str::to_string),
            callback: Arc::new(callback),
        });
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Emits an event to all matching listeners and returns its sequence number.
    ///
    /// A snapshot of the listener list is taken first: listeners removed
    /// during the callbacks still see this event, listeners added during the
    /// callbacks do not.
    pub fn emit(&self, mut event: ChangeEvent) -> u64 {
        {
            let mut history = self.history.write();
            event.sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        let matching: Vec<Arc<ListenerFn>> = self
            .listeners
            .lock()
            .iter()
            .filter(|l| l.matches(&event))
            .map(|l| Arc::clone(&l.callback))
            .collect();
        for callback in matching {
            callback(&event);
        }
        event.sequence
    }

    /// Emits events in order.
    pub fn emit_batch(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Polls events with sequence greater than `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        let history = self.history.read();
        history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().back().map_or(0, |e| e.sequence)
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    /// Drops history older than the given sequence.
    pub fn truncate_history(&self, min_sequence: u64) {
        self.history.write().retain(|e| e.sequence >= min_sequence);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("listeners", &self.listener_count())
            .field("history", &self.history_len())
            .field("max_history", &self.max_history)
            .finish()
    }
}
