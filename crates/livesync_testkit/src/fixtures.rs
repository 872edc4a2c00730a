//! Schema and row fixtures.
//!
//! Two schemas are provided:
//! - the chat module (`User` keyed by `identity`, keyless `Message`, two
//!   reducers), as a server would describe it with `expand=true`
//! - a minimal schema (`Message` with `id`/`text`, keyless `Log`) for
//!   reconciler scenarios

use livesync_codec::{BuiltinType, EntitySchema, SchemaDescription, TypeDescriptor};
use serde_json::{json, Value};

/// Expanded schema description of the chat module.
pub const CHAT_SCHEMA_JSON: &str = r#"{
  "entities": {
    "User": {
      "type": "table",
      "arity": 3,
      "schema": {"name": "User", "elements": [
        {"name": {"some": "identity"}, "algebraic_type": {"Product": {"elements": [
          {"name": {"some": "__identity_bytes"}, "algebraic_type": {"Builtin": {"Array": {"Builtin": {"U8": []}}}}}
        ]}}},
        {"name": {"some": "name"}, "algebraic_type": {"Sum": {"variants": [
          {"name": {"some": "some"}, "algebraic_type": {"Builtin": {"String": []}}},
          {"name": {"some": "none"}, "algebraic_type": {"Product": {"elements": []}}}
        ]}}},
        {"name": {"some": "online"}, "algebraic_type": {"Builtin": {"Bool": []}}}
      ]}
    },
    "Message": {
      "type": "table",
      "arity": 3,
      "schema": {"name": "Message", "elements": [
        {"name": {"some": "sender"}, "algebraic_type": {"Ref": 0}},
        {"name": {"some": "sent"}, "algebraic_type": {"Builtin": {"U64": []}}},
        {"name": {"some": "text"}, "algebraic_type": {"Builtin": {"String": []}}}
      ]}
    },
    "send_message": {
      "type": "reducer",
      "arity": 1,
      "schema": {"name": "send_message", "elements": [
        {"name": {"some": "text"}, "algebraic_type": {"Builtin": {"String": []}}}
      ]}
    },
    "set_name": {
      "type": "reducer",
      "arity": 1,
      "schema": {"name": "set_name", "elements": [
        {"name": {"some": "name"}, "algebraic_type": {"Builtin": {"String": []}}}
      ]}
    }
  },
  "typespace": [
    {"Product": {"elements": [
      {"name": {"some": "__identity_bytes"}, "algebraic_type": {"Builtin": {"Array": {"Builtin": {"U8": []}}}}}
    ]}}
  ]
}"#;

/// The chat module schema.
pub fn chat_schema() -> SchemaDescription {
    SchemaDescription::parse(CHAT_SCHEMA_JSON).expect("chat schema fixture is valid")
}

/// A minimal schema: `Message(id: U32, text: String)` and `Log(text: String)`.
pub fn simple_schema() -> SchemaDescription {
    SchemaDescription::new()
        .with_entity(
            "Message",
            EntitySchema::table([
                ("id", TypeDescriptor::builtin(BuiltinType::U32)),
                ("text", TypeDescriptor::builtin(BuiltinType::String)),
            ]),
        )
        .with_entity(
            "Log",
            EntitySchema::table([("text", TypeDescriptor::builtin(BuiltinType::String))]),
        )
}

/// A deterministic 32-byte identity in hex, derived from `n`.
pub fn identity_hex(n: u8) -> String {
    format!("{n:02x}").repeat(32)
}

/// Raw `User` row.
pub fn user_row(n: u8, name: Option<&str>, online: bool) -> Value {
    let name = match name {
        Some(name) => json!({"0": name}),
        None => json!({"1": []}),
    };
    json!([[identity_hex(n)], name, online])
}

/// Raw `Message` row of the chat schema.
pub fn chat_message_row(sender: u8, sent: u64, text: &str) -> Value {
    json!([[identity_hex(sender)], sent.to_string(), text])
}

/// Raw `Message` row of the minimal schema.
pub fn message_row(id: u32, text: &str) -> Value {
    json!([id, text])
}

/// Raw insert operation.
pub fn insert_op(row: Value) -> Value {
    json!({"op": "insert", "row": row})
}

/// Raw delete operation.
pub fn delete_op(row: Value) -> Value {
    json!({"op": "delete", "row": row})
}

/// Raw table update.
pub fn table_update(table: &str, operations: Vec<Value>) -> Value {
    json!({"table_name": table, "table_row_operations": operations})
}

/// `TransactionUpdate` server message.
pub fn transaction_update(tables: Vec<Value>) -> Value {
    json!({"TransactionUpdate": {
        "event": {"status": "committed"},
        "subscription_update": {"table_updates": tables}
    }})
}

/// `SubscriptionUpdate` server message.
pub fn subscription_update(tables: Vec<Value>) -> Value {
    json!({"SubscriptionUpdate": {"table_updates": tables}})
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_codec::{decode_row, DomainValue, EntityKind};

    #[test]
    fn chat_schema_parses() {
        let schema = chat_schema();
        assert_eq!(schema.entity("User").unwrap().kind, EntityKind::Table);
        assert_eq!(schema.entity("set_name").unwrap().kind, EntityKind::Reducer);
        assert_eq!(schema.typespace.len(), 1);
    }

    #[test]
    fn chat_rows_decode() {
        let schema = chat_schema();
        let user = decode_row(
            schema.entity("User").unwrap(),
            &user_row(1, Some("alice"), true),
            Some(&schema.typespace),
        )
        .unwrap();
        assert_eq!(user.get("name").and_then(DomainValue::as_str), Some("alice"));
        assert_eq!(
            user.get("identity").and_then(DomainValue::as_identity).map(|i| i.to_hex()),
            Some(identity_hex(1))
        );

        let anonymous = decode_row(
            schema.entity("User").unwrap(),
            &user_row(2, None, false),
            Some(&schema.typespace),
        )
        .unwrap();
        assert_eq!(anonymous.get("name"), Some(&DomainValue::Null));

        let message = decode_row(
            schema.entity("Message").unwrap(),
            &chat_message_row(1, u64::MAX, "hi"),
            Some(&schema.typespace),
        )
        .unwrap();
        assert_eq!(
            message.get("sent").and_then(DomainValue::as_u128),
            Some(u128::from(u64::MAX))
        );
    }
}
