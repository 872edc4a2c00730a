//! Turns raw row operations into semantic change events.
//!
//! For each table batch the reconciler decodes every row first, then updates
//! the table snapshot and finally emits events on the change feed. A decode
//! failure therefore leaves the failing table exactly as it was, while tables
//! earlier in the same call keep their changes.
//!
//! ## Pairing
//!
//! Keyless tables treat every operation independently; the row key is the
//! whole raw row. Keyed tables pair a delete and an insert with the same
//! primary-key value into a single update. When several deletes share a key
//! the earliest pending one is paired first.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::AddAssign;
use std::sync::Arc;

use livesync_codec::{decode_row, DecodeError, DomainValue, EntityKind, EntitySchema, RowKey, SchemaDescription};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::message::{OperationKind, RowOperation, ServerMessage, TableUpdate};
use crate::store::{ClientStore, TableSnapshot};

/// Counts of what one call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Table batches applied.
    pub tables: usize,
    /// Rows inserted.
    pub inserts: usize,
    /// Rows updated in place.
    pub updates: usize,
    /// Rows deleted.
    pub deletes: usize,
}

impl ApplySummary {
    /// Total number of row events.
    pub fn events(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    fn count(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Insert => self.inserts += 1,
            ChangeKind::Update => self.updates += 1,
            ChangeKind::Delete => self.deletes += 1,
            ChangeKind::Refetch => {}
        }
    }
}

impl AddAssign for ApplySummary {
    fn add_assign(&mut self, other: Self) {
        self.tables += other.tables;
        self.inserts += other.inserts;
        self.updates += other.updates;
        self.deletes += other.deletes;
    }
}

struct DecodedRow {
    op: OperationKind,
    key: RowKey,
    value: Arc<DomainValue>,
}

/// Applies server updates to a [`ClientStore`] and publishes the resulting
/// changes on a [`ChangeFeed`].
pub struct Reconciler {
    schema: Arc<SchemaDescription>,
    config: ClientConfig,
    primary_keys: BTreeMap<String, usize>,
    store: Arc<ClientStore>,
    feed: Arc<ChangeFeed>,
}

impl Reconciler {
    /// Creates a reconciler with a fresh store and feed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SchemaConfig`] if a configured primary key names
    /// an unknown table, a reducer, or a column the table does not have.
    pub fn new(schema: SchemaDescription, config: ClientConfig) -> SyncResult<Self> {
        let feed = Arc::new(ChangeFeed::with_max_history(config.max_history));
        Self::with_parts(Arc::new(schema), config, Arc::new(ClientStore::new()), feed)
    }

    /// Creates a reconciler over an existing store and feed.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::new`].
    pub fn with_parts(
        schema: Arc<SchemaDescription>,
        config: ClientConfig,
        store: Arc<ClientStore>,
        feed: Arc<ChangeFeed>,
    ) -> SyncResult<Self> {
        let mut primary_keys = BTreeMap::new();
        for (table, column) in &config.primary_keys {
            let entity = schema.entity(table).ok_or_else(|| {
                SyncError::schema_config(format!("primary key configured for unknown table {table}"))
            })?;
            if entity.kind != EntityKind::Table {
                return Err(SyncError::schema_config(format!(
                    "primary key configured for reducer {table}"
                )));
            }
            let index = entity.column_index(column).ok_or_else(|| {
                SyncError::schema_config(format!("table {table} has no column {column}"))
            })?;
            primary_keys.insert(table.clone(), index);
        }

        Ok(Self {
            schema,
            config,
            primary_keys,
            store,
            feed,
        })
    }

    /// The store this reconciler maintains.
    pub fn store(&self) -> &Arc<ClientStore> {
        &self.store
    }

    /// The feed this reconciler publishes to.
    pub fn feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    /// The schema rows are decoded against.
    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Computes the row key a raw row of `table` is stored under.
    ///
    /// # Errors
    ///
    /// Fails if the table is unknown or the primary-key field is missing.
    pub fn row_key(&self, table: &str, raw: &Value) -> SyncResult<RowKey> {
        let entity = self
            .schema
            .entity(table)
            .ok_or_else(|| SyncError::schema_config(format!("table {table} is not in the schema")))?;
        self.key_of(entity, self.primary_keys.get(table).copied(), raw)
            .map_err(|e| SyncError::decode(table, e))
    }

    /// Applies incremental table updates.
    ///
    /// Events for each table are emitted before the next table is processed.
    ///
    /// # Errors
    ///
    /// A decode failure aborts the failing table and every table after it;
    /// tables before it keep their changes.
    pub fn apply(&self, updates: &[TableUpdate]) -> SyncResult<ApplySummary> {
        let mut summary = ApplySummary::default();
        for update in updates {
            let Some(entity) = self.table_entity(&update.table_name)? else {
                continue;
            };
            summary += self.apply_table(&update.table_name, entity, &update.table_row_operations)?;
        }
        Ok(summary)
    }

    /// Replaces the named tables with the rows of an initial subscription.
    ///
    /// No per-row events are emitted; each table gets a single refetch signal
    /// once its snapshot has been replaced.
    ///
    /// # Errors
    ///
    /// As for [`Reconciler::apply`].
    pub fn apply_initial(&self, updates: &[TableUpdate]) -> SyncResult<ApplySummary> {
        let mut summary = ApplySummary::default();
        for update in updates {
            let table = update.table_name.as_str();
            let Some(entity) = self.table_entity(table)? else {
                continue;
            };
            let rows = self.decode_batch(table, entity, &update.table_row_operations)?;

            let mut snapshot = TableSnapshot::new();
            for row in rows {
                match row.op {
                    OperationKind::Insert => {
                        snapshot.insert(row.key, row.value);
                    }
                    OperationKind::Delete => {
                        snapshot.remove(&row.key);
                    }
                }
            }
            debug!(table, rows = snapshot.len(), "replaced table snapshot");

            summary.tables += 1;
            summary.inserts += snapshot.len();
            self.store.replace(table, snapshot);
            self.feed.emit(ChangeEvent::refetch(table));
        }
        Ok(summary)
    }

    /// Routes a server message to [`Reconciler::apply_initial`] or
    /// [`Reconciler::apply`]. Messages without rows are ignored.
    ///
    /// # Errors
    ///
    /// As for [`Reconciler::apply`].
    pub fn apply_message(&self, message: &ServerMessage) -> SyncResult<ApplySummary> {
        match message {
            ServerMessage::SubscriptionUpdate(update) => self.apply_initial(&update.table_updates),
            ServerMessage::TransactionUpdate(tx) => self.apply(&tx.subscription_update.table_updates),
            ServerMessage::IdentityToken(_) => {
                trace!("ignoring identity token");
                Ok(ApplySummary::default())
            }
        }
    }

    /// Parses and applies a JSON server message.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Message`] if the text is not a known message.
    pub fn apply_json(&self, json: &str) -> SyncResult<ApplySummary> {
        self.apply_message(&ServerMessage::parse(json)?)
    }

    fn table_entity(&self, table: &str) -> SyncResult<Option<&EntitySchema>> {
        match self.schema.entity(table) {
            Some(entity) if entity.kind == EntityKind::Table => Ok(Some(entity)),
            Some(_) => Err(SyncError::schema_config(format!(
                "{table} is a reducer and cannot carry rows"
            ))),
            None if self.config.strict_tables => Err(SyncError::schema_config(format!(
                "table {table} is not in the schema"
            ))),
            None => {
                warn!(table, "skipping update for table missing from schema");
                Ok(None)
            }
        }
    }

    fn apply_table(
        &self,
        table: &str,
        entity: &EntitySchema,
        operations: &[RowOperation],
    ) -> SyncResult<ApplySummary> {
        let rows = self.decode_batch(table, entity, operations)?;
        let keyed = self.primary_keys.contains_key(table);

        let events = self.store.with_table_mut(table, |snapshot| {
            if keyed {
                reconcile_keyed(table, snapshot, rows)
            } else {
                reconcile_keyless(table, snapshot, rows)
            }
        });

        let mut summary = ApplySummary {
            tables: 1,
            ..ApplySummary::default()
        };
        for event in &events {
            summary.count(event.kind);
        }
        debug!(
            table,
            inserts = summary.inserts,
            updates = summary.updates,
            deletes = summary.deletes,
            "applied table update"
        );

        self.feed.emit_batch(events);
        Ok(summary)
    }

    fn decode_batch(
        &self,
        table: &str,
        entity: &EntitySchema,
        operations: &[RowOperation],
    ) -> SyncResult<Vec<DecodedRow>> {
        let pk = self.primary_keys.get(table).copied();
        operations
            .iter()
            .map(|operation| {
                let value = decode_row(entity, &operation.row, Some(&self.schema.typespace))
                    .map_err(|e| SyncError::decode(table, e))?;
                let key = self
                    .key_of(entity, pk, &operation.row)
                    .map_err(|e| SyncError::decode(table, e))?;
                Ok(DecodedRow {
                    op: operation.op,
                    key,
                    value: Arc::new(value),
                })
            })
            .collect()
    }

    fn key_of(&self, entity: &EntitySchema, pk: Option<usize>, raw: &Value) -> Result<RowKey, DecodeError> {
        let Some(index) = pk else {
            return Ok(RowKey::from_raw(raw));
        };
        let label = entity
            .elements
            .get(index)
            .map(|e| e.label(index))
            .unwrap_or_else(|| index.to_string());
        let field = match raw {
            Value::Array(items) => items.get(index),
            Value::Object(map) => map.get(&label),
            other => return Err(DecodeError::type_mismatch("row", other)),
        };
        field
            .map(RowKey::from_raw)
            .ok_or_else(|| DecodeError::missing_field(label))
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("tables", &self.schema.entities.len())
            .field("primary_keys", &self.config.primary_keys)
            .field("feed", &self.feed)
            .finish()
    }
}

fn reconcile_keyless(table: &str, snapshot: &mut TableSnapshot, rows: Vec<DecodedRow>) -> Vec<ChangeEvent> {
    rows.into_iter()
        .map(|row| match row.op {
            OperationKind::Insert => {
                snapshot.insert(row.key.clone(), Arc::clone(&row.value));
                ChangeEvent::insert(table, row.key, row.value)
            }
            OperationKind::Delete => {
                let old = snapshot.remove(&row.key);
                if old.is_none() {
                    trace!(table, key = %row.key, "delete of a row never observed");
                }
                ChangeEvent::delete(table, row.key, old)
            }
        })
        .collect()
}

fn reconcile_keyed(table: &str, snapshot: &mut TableSnapshot, rows: Vec<DecodedRow>) -> Vec<ChangeEvent> {
    let mut inserts = Vec::new();
    let mut deletes: Vec<Option<DecodedRow>> = Vec::new();
    let mut pending: HashMap<RowKey, VecDeque<usize>> = HashMap::new();

    for row in rows {
        match row.op {
            OperationKind::Insert => inserts.push(row),
            OperationKind::Delete => {
                pending.entry(row.key.clone()).or_default().push_back(deletes.len());
                deletes.push(Some(row));
            }
        }
    }

    let mut events = Vec::with_capacity(inserts.len() + deletes.len());
    for insert in inserts {
        let paired = pending
            .get_mut(&insert.key)
            .and_then(VecDeque::pop_front)
            .and_then(|index| deletes[index].take());

        match paired {
            Some(delete) => {
                // Rows this client never saw fall back to the delete's content.
                let old = snapshot.remove(&delete.key).unwrap_or(delete.value);
                snapshot.insert(insert.key.clone(), Arc::clone(&insert.value));
                events.push(ChangeEvent::update(table, delete.key, insert.key, old, insert.value));
            }
            None => {
                snapshot.insert(insert.key.clone(), Arc::clone(&insert.value));
                events.push(ChangeEvent::insert(table, insert.key, insert.value));
            }
        }
    }

    for delete in deletes.into_iter().flatten() {
        let old = snapshot.remove(&delete.key);
        if old.is_none() {
            trace!(table, key = %delete.key, "delete of a row never observed");
        }
        events.push(ChangeEvent::delete(table, delete.key, old));
    }
    events
}
