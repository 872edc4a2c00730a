//! Replay command implementation.

use livesync_codec::SchemaDescription;
use livesync_core::{ApplySummary, ChangeEvent, ClientConfig, Reconciler};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Result of replaying a message log.
#[derive(Debug, Serialize)]
pub struct ReplayResult {
    /// Number of messages applied.
    pub messages: usize,
    /// Emitted change events in order.
    pub events: Vec<EventRecord>,
    /// Row count per table after the last message.
    pub tables: Vec<TableCount>,
    /// Totals across all messages.
    pub inserts: usize,
    /// Number of update events.
    pub updates: usize,
    /// Number of delete events.
    pub deletes: usize,
}

/// A change event rendered for output.
#[derive(Debug, Serialize)]
pub struct EventRecord {
    /// Feed sequence number.
    pub sequence: u64,
    /// Event kind.
    pub kind: &'static str,
    /// Table name.
    pub table: String,
    /// Row before the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    /// Row after the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

impl From<&ChangeEvent> for EventRecord {
    fn from(event: &ChangeEvent) -> Self {
        Self {
            sequence: event.sequence,
            kind: event.kind.as_str(),
            table: event.table.clone(),
            old: event.old_value.as_deref().map(|v| v.to_json()),
            new: event.new_value.as_deref().map(|v| v.to_json()),
        }
    }
}

/// Final size of one table.
#[derive(Debug, Serialize)]
pub struct TableCount {
    /// Table name.
    pub table: String,
    /// Number of rows.
    pub rows: usize,
}

/// Parses `TABLE=COLUMN` primary-key arguments into a config.
pub fn parse_primary_keys(args: &[String]) -> Result<ClientConfig, String> {
    args.iter().try_fold(ClientConfig::new(), |config, arg| {
        match arg.split_once('=') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                Ok(config.with_primary_key(table, column))
            }
            _ => Err(format!("invalid primary key {arg:?}, expected TABLE=COLUMN")),
        }
    })
}

/// Applies each non-empty line of `log` as a server message.
pub fn replay(
    schema: SchemaDescription,
    config: ClientConfig,
    log: &str,
) -> Result<ReplayResult, Box<dyn std::error::Error>> {
    let reconciler = Reconciler::new(schema, config)?;

    // The feed history is bounded, so events are captured as they are emitted.
    let captured: Arc<Mutex<Vec<EventRecord>>> = Arc::default();
    let sink = Arc::clone(&captured);
    let subscription = reconciler
        .feed()
        .on_change(None, move |event: &ChangeEvent| sink.lock().push(EventRecord::from(event)));

    let mut result = ReplayResult {
        messages: 0,
        events: Vec::new(),
        tables: Vec::new(),
        inserts: 0,
        updates: 0,
        deletes: 0,
    };
    let mut totals = ApplySummary::default();

    for (index, line) in log.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let summary = reconciler
            .apply_json(line)
            .map_err(|e| format!("line {}: {e}", index + 1))?;
        info!(
            line = index + 1,
            tables = summary.tables,
            events = summary.events(),
            "applied message"
        );
        totals += summary;
        result.messages += 1;
    }
    subscription.unsubscribe();

    result.events = std::mem::take(&mut *captured.lock());

    result.inserts = totals.inserts;
    result.updates = totals.updates;
    result.deletes = totals.deletes;
    result.tables = reconciler
        .store()
        .table_names()
        .into_iter()
        .map(|table| TableCount {
            rows: reconciler.store().count(&table),
            table,
        })
        .collect();
    Ok(result)
}

/// Runs the replay command.
pub fn run(
    schema_path: &Path,
    messages_path: &Path,
    primary_keys: &[String],
    strict: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = super::load_schema(schema_path)?;
    let config = parse_primary_keys(primary_keys)?.strict_tables(strict);
    let log = std::fs::read_to_string(messages_path)
        .map_err(|e| format!("cannot read messages {}: {e}", messages_path.display()))?;

    let result = replay(schema, config, &log)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &ReplayResult) {
    println!("Replay");
    println!("======");
    println!();
    for event in &result.events {
        let render = |v: &Option<Value>| v.as_ref().map_or_else(|| "-".to_string(), Value::to_string);
        println!(
            "#{:<6} {:<8} {:<16} {} -> {}",
            event.sequence,
            event.kind,
            event.table,
            render(&event.old),
            render(&event.new)
        );
    }
    println!();
    println!("Messages: {}", result.messages);
    println!(
        "Events:   {} inserts, {} updates, {} deletes",
        result.inserts, result.updates, result.deletes
    );
    println!();
    println!("Tables:");
    for table in &result.tables {
        println!("  {:<16} {} rows", table.table, table.rows);
    }
}
