//! Live filters over reconciled tables.

use std::sync::Arc;

use livesync_codec::{DomainValue, RowKey};
use livesync_core::{ChangeEvent, ChangeFeed, ClientStore, Subscription};

use crate::filter::{LiveFilter, Predicate};
use crate::source::{
    DeleteHandler, EventSource, InsertHandler, RefetchHandler, Registration, UpdateHandler,
};
use crate::storage::{FilterStorage, MapStorage};

/// A row as held by the client store.
pub type TableRow = Arc<DomainValue>;

/// A live filter over one table of a [`ClientStore`].
pub type TableFilter<S = MapStorage<RowKey, TableRow>> = LiveFilter<RowKey, TableRow, S>;

/// Adapts the events of one table in a [`ChangeFeed`] to an [`EventSource`].
#[derive(Clone)]
pub struct FeedSource {
    feed: Arc<ChangeFeed>,
    table: String,
}

impl FeedSource {
    /// Creates a source for `table`.
    pub fn new(feed: Arc<ChangeFeed>, table: impl Into<String>) -> Self {
        Self {
            feed,
            table: table.into(),
        }
    }

    /// The table this source follows.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl std::fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSource").field("table", &self.table).finish()
    }
}

fn unsubscribe_on(sub: Subscription) -> Option<Registration> {
    Some(Box::new(move || sub.unsubscribe()))
}

impl EventSource<RowKey, TableRow> for FeedSource {
    fn register_insert(&self, handler: InsertHandler<RowKey, TableRow>) -> Option<Registration> {
        let sub = self.feed.on_insert(Some(self.table.as_str()), move |event: &ChangeEvent| {
            if let (Some(key), Some(row)) = (&event.new_key, &event.new_value) {
                handler(key, row);
            }
        });
        unsubscribe_on(sub)
    }

    fn register_update(&self, handler: UpdateHandler<RowKey, TableRow>) -> Option<Registration> {
        let sub = self.feed.on_update(Some(self.table.as_str()), move |event: &ChangeEvent| {
            if let (Some(old_key), Some(new_key), Some(row)) =
                (&event.old_key, &event.new_key, &event.new_value)
            {
                handler(old_key, new_key, row);
            }
        });
        unsubscribe_on(sub)
    }

    fn register_delete(&self, handler: DeleteHandler<RowKey>) -> Option<Registration> {
        let sub = self.feed.on_delete(Some(self.table.as_str()), move |event: &ChangeEvent| {
            if let Some(key) = &event.old_key {
                handler(key);
            }
        });
        unsubscribe_on(sub)
    }

    fn register_refetch(&self, handler: RefetchHandler) -> Option<Registration> {
        let sub = self
            .feed
            .on_refetch(Some(self.table.as_str()), move |_: &ChangeEvent| handler());
        unsubscribe_on(sub)
    }
}

/// Creates a keyed live filter over `table`.
///
/// The filter reads the table from `store` for full refilters and follows
/// `feed` for incremental changes.
pub fn table_filter(
    store: Arc<ClientStore>,
    feed: Arc<ChangeFeed>,
    table: impl Into<String>,
    predicate: Option<Predicate<TableRow>>,
) -> TableFilter {
    table_filter_with(store, feed, table, predicate, MapStorage::new())
}

/// Like [`table_filter`], with a chosen output storage.
pub fn table_filter_with<S>(
    store: Arc<ClientStore>,
    feed: Arc<ChangeFeed>,
    table: impl Into<String>,
    predicate: Option<Predicate<TableRow>>,
    storage: S,
) -> TableFilter<S>
where
    S: FilterStorage<RowKey, TableRow> + Send + 'static,
{
    let table = table.into();
    let events = FeedSource::new(feed, table.clone());
    LiveFilter::new(move || store.rows(&table), predicate, events, storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::predicate;

    fn text_row(text: &str) -> TableRow {
        Arc::new(DomainValue::Product(vec![(
            "text".to_string(),
            DomainValue::String(text.to_string()),
        )]))
    }

    fn key(n: u32) -> RowKey {
        RowKey::from(&serde_json::json!(n))
    }

    #[test]
    fn feed_events_reach_the_filter() {
        let store = Arc::new(ClientStore::new());
        let feed = Arc::new(ChangeFeed::new());
        let filter = table_filter(
            Arc::clone(&store),
            Arc::clone(&feed),
            "Message",
            Some(predicate(|_: &TableRow| true)),
        );
        filter.populate().unwrap();
        assert_eq!(feed.listener_count(), 4);

        feed.emit(ChangeEvent::insert("Message", key(1), text_row("a")));
        feed.emit(ChangeEvent::insert("Other", key(2), text_row("b")));
        assert_eq!(filter.snapshot().unwrap().len(), 1);

        feed.emit(ChangeEvent::update(
            "Message",
            key(1),
            key(3),
            text_row("a"),
            text_row("c"),
        ));
        assert!(filter.contains(&key(3)).unwrap());

        feed.emit(ChangeEvent::delete("Message", key(3), None));
        assert!(filter.is_empty().unwrap());

        filter.dispose();
        assert_eq!(feed.listener_count(), 0);
    }
}
