//! Benchmark workloads for livesync.
//!
//! Deterministic row and batch builders shared by the criterion benches.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use livesync_core::{RowOperation, TableUpdate};
use livesync_testkit::{chat_message_row, message_row};
use serde_json::Value;

/// Message texts of varying length, so predicates on length split the rows.
pub fn text_for(i: u32) -> String {
    "x".repeat((i % 7) as usize)
}

/// `count` raw rows of the chat `Message` table.
pub fn chat_messages(count: u32) -> Vec<Value> {
    (0..count)
        .map(|i| chat_message_row((i % 16) as u8, u64::from(i) * 1_000, &text_for(i)))
        .collect()
}

/// A table update inserting rows `0..count` of the minimal `Message` table.
pub fn insert_batch(count: u32) -> TableUpdate {
    let ops = (0..count)
        .map(|i| RowOperation::insert(message_row(i, &text_for(i))))
        .collect();
    TableUpdate::new("Message", ops)
}

/// A table update rewriting every row of [`insert_batch`] with new text.
pub fn rewrite_batch(count: u32) -> TableUpdate {
    let ops = (0..count)
        .flat_map(|i| {
            [
                RowOperation::delete(message_row(i, &text_for(i))),
                RowOperation::insert(message_row(i, &text_for(i + 1))),
            ]
        })
        .collect();
    TableUpdate::new("Message", ops)
}
