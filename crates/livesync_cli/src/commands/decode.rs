//! Decode command implementation.

use livesync_codec::{decode_row, EntityKind, SchemaDescription};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Decodes `raw` as a row of `table` and renders it as JSON.
pub fn decode_table_row(
    schema: &SchemaDescription,
    table: &str,
    raw: &Value,
) -> Result<Value, Box<dyn std::error::Error>> {
    let entity = schema
        .entity(table)
        .ok_or_else(|| format!("table {table} is not in the schema"))?;
    if entity.kind != EntityKind::Table {
        return Err(format!("{table} is a reducer, not a table").into());
    }

    let row = decode_row(entity, raw, Some(&schema.typespace))?;
    debug!(table, columns = entity.elements.len(), "decoded row");
    Ok(row.to_json())
}

/// Runs the decode command.
pub fn run(schema_path: &Path, table: &str, row_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let schema = super::load_schema(schema_path)?;
    let text = std::fs::read_to_string(row_path)
        .map_err(|e| format!("cannot read row {}: {e}", row_path.display()))?;
    let raw: Value = serde_json::from_str(&text)?;

    let decoded = decode_table_row(&schema, table, &raw)?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_testkit::{chat_message_row, chat_schema, identity_hex, user_row};
    use serde_json::json;

    #[test]
    fn decodes_chat_rows() {
        let schema = chat_schema();

        let user = decode_table_row(&schema, "User", &user_row(7, Some("ada"), true)).unwrap();
        assert_eq!(
            user,
            json!({"identity": identity_hex(7), "name": "ada", "online": true})
        );

        let message =
            decode_table_row(&schema, "Message", &chat_message_row(7, u64::MAX, "hi")).unwrap();
        assert_eq!(message["sent"], json!("18446744073709551615"));
        assert_eq!(message["sender"], json!(identity_hex(7)));
    }

    #[test]
    fn rejects_reducers_and_unknown_tables() {
        let schema = chat_schema();
        assert!(decode_table_row(&schema, "set_name", &json!(["x"])).is_err());
        assert!(decode_table_row(&schema, "Nope", &json!([])).is_err());
    }

    #[test]
    fn run_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.json");
        let row_path = dir.path().join("row.json");
        std::fs::write(&schema_path, livesync_testkit::CHAT_SCHEMA_JSON).unwrap();
        std::fs::write(&row_path, user_row(1, None, false).to_string()).unwrap();

        run(&schema_path, "User", &row_path).unwrap();
        assert!(run(&schema_path, "User", &dir.path().join("missing.json")).is_err());
    }
}
