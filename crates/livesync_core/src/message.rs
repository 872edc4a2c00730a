//! Wire shapes delivered by the transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// Kind of a raw row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Row was added to the subscribed set.
    Insert,
    /// Row was removed from the subscribed set.
    Delete,
}

/// One insert or delete of a raw, undecoded row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOperation {
    /// Insert or delete.
    pub op: OperationKind,
    /// Positional (or named) raw field values.
    pub row: Value,
}

impl RowOperation {
    /// Creates an insert operation.
    pub fn insert(row: Value) -> Self {
        Self {
            op: OperationKind::Insert,
            row,
        }
    }

    /// Creates a delete operation.
    pub fn delete(row: Value) -> Self {
        Self {
            op: OperationKind::Delete,
            row,
        }
    }
}

/// The row operations for one table delivered in one batch.
///
/// Order is significant: a delete for a logical row never comes after the
/// insert that replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableUpdate {
    /// Server-side table id, when the server sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<u32>,
    /// Table name as it appears in the schema.
    pub table_name: String,
    /// Ordered operations.
    #[serde(default)]
    pub table_row_operations: Vec<RowOperation>,
}

impl TableUpdate {
    /// Creates a table update.
    pub fn new(table_name: impl Into<String>, operations: Vec<RowOperation>) -> Self {
        Self {
            table_id: None,
            table_name: table_name.into(),
            table_row_operations: operations,
        }
    }
}

/// A set of table updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    /// Per-table batches.
    #[serde(default)]
    pub table_updates: Vec<TableUpdate>,
}

/// Table updates caused by a committed transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    /// The resulting row changes.
    pub subscription_update: SubscriptionUpdate,
}

/// Identity assigned to this connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityToken {
    /// Hex identity.
    pub identity: String,
    /// Auth token.
    pub token: String,
    /// Hex connection address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Server message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Full contents of the subscribed tables.
    SubscriptionUpdate(SubscriptionUpdate),
    /// Incremental changes after a transaction.
    TransactionUpdate(TransactionUpdate),
    /// Connection identity; carries no rows.
    IdentityToken(IdentityToken),
}

impl ServerMessage {
    /// Parses a server message from JSON text.
    pub fn parse(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json).map_err(SyncError::from)
    }

    /// Parses a server message from a JSON value.
    pub fn from_value(value: Value) -> SyncResult<Self> {
        serde_json::from_value(value).map_err(SyncError::from)
    }

    /// Message tag name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::SubscriptionUpdate(_) => "SubscriptionUpdate",
            ServerMessage::TransactionUpdate(_) => "TransactionUpdate",
            ServerMessage::IdentityToken(_) => "IdentityToken",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_transaction_update() {
        let msg = ServerMessage::parse(
            r#"{"TransactionUpdate": {
                "event": {"status": "committed"},
                "subscription_update": {"table_updates": [{
                    "table_id": 4,
                    "table_name": "Message",
                    "table_row_operations": [
                        {"op": "delete", "row": [5, "old"]},
                        {"op": "insert", "row": [5, "new"]}
                    ]
                }]}
            }}"#,
        )
        .unwrap();

        match msg {
            ServerMessage::TransactionUpdate(tx) => {
                let update = &tx.subscription_update.table_updates[0];
                assert_eq!(update.table_id, Some(4));
                assert_eq!(update.table_name, "Message");
                assert_eq!(update.table_row_operations[0].op, OperationKind::Delete);
                assert_eq!(update.table_row_operations[1].row, json!([5, "new"]));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parse_identity_token() {
        let msg = ServerMessage::from_value(json!({
            "IdentityToken": {"identity": "ab", "token": "t"}
        }))
        .unwrap();
        assert_eq!(msg.kind(), "IdentityToken");
    }

    #[test]
    fn unknown_tag_is_a_message_error() {
        let err = ServerMessage::parse(r#"{"OneOffQueryResponse": {}}"#).unwrap_err();
        assert!(matches!(err, SyncError::Message { .. }));
    }

    #[test]
    fn missing_operations_default_to_empty() {
        let update: TableUpdate = serde_json::from_value(json!({"table_name": "User"})).unwrap();
        assert!(update.table_row_operations.is_empty());
    }
}
