//! Property-based test generators using proptest.

use livesync_codec::BuiltinType;
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for short message texts, including empty ones.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z!?]{0,6}").expect("Invalid regex")
}

/// Strategy for raw rows of the minimal `Message` table.
pub fn message_row_strategy(max_id: u32) -> impl Strategy<Value = Value> {
    (0..max_id, text_strategy()).prop_map(|(id, text)| json!([id, text]))
}

/// A change to a keyed source collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOp {
    /// Insert or replace the row with this id.
    Upsert {
        /// Row id.
        id: u32,
        /// New text.
        text: String,
    },
    /// Remove the row with this id.
    Delete {
        /// Row id.
        id: u32,
    },
}

/// Strategy for a sequence of source changes over ids `0..max_id`.
///
/// A small id range makes updates and deletes of existing rows likely.
pub fn source_ops_strategy(max_id: u32, max_len: usize) -> impl Strategy<Value = Vec<SourceOp>> {
    let op = prop_oneof![
        3 => (0..max_id, text_strategy()).prop_map(|(id, text)| SourceOp::Upsert { id, text }),
        1 => (0..max_id).prop_map(|id| SourceOp::Delete { id }),
    ];
    prop::collection::vec(op, 0..max_len)
}

/// Strategy for an integer builtin paired with an in-range wire value.
///
/// 64- and 128-bit values travel as decimal strings, as the server sends them.
pub fn integer_wire_strategy() -> impl Strategy<Value = (BuiltinType, Value)> {
    prop_oneof![
        any::<i8>().prop_map(|n| (BuiltinType::I8, json!(n))),
        any::<u8>().prop_map(|n| (BuiltinType::U8, json!(n))),
        any::<i16>().prop_map(|n| (BuiltinType::I16, json!(n))),
        any::<u16>().prop_map(|n| (BuiltinType::U16, json!(n))),
        any::<i32>().prop_map(|n| (BuiltinType::I32, json!(n))),
        any::<u32>().prop_map(|n| (BuiltinType::U32, json!(n))),
        any::<i64>().prop_map(|n| (BuiltinType::I64, json!(n.to_string()))),
        any::<u64>().prop_map(|n| (BuiltinType::U64, json!(n.to_string()))),
        any::<i128>().prop_map(|n| (BuiltinType::I128, json!(n.to_string()))),
        any::<u128>().prop_map(|n| (BuiltinType::U128, json!(n.to_string()))),
    ]
}
