//! # Livesync Core
//!
//! Client-side reconciliation for livesync.
//!
//! This crate provides:
//! - Wire shapes for server messages and table updates
//! - A per-connection [`ClientStore`] of decoded table snapshots
//! - The [`Reconciler`], which pairs raw deletes and inserts into
//!   insert/update/delete events
//! - A [`ChangeFeed`] that publishes those events to listeners
//!
//! ## Usage
//!
//! ```
//! use livesync_codec::{BuiltinType, EntitySchema, SchemaDescription, TypeDescriptor};
//! use livesync_core::{ClientConfig, Reconciler, RowOperation, TableUpdate};
//! use serde_json::json;
//!
//! let schema = SchemaDescription::new().with_entity(
//!     "Message",
//!     EntitySchema::table([
//!         ("id", TypeDescriptor::builtin(BuiltinType::U32)),
//!         ("text", TypeDescriptor::builtin(BuiltinType::String)),
//!     ]),
//! );
//! let config = ClientConfig::new().with_primary_key("Message", "id");
//! let reconciler = Reconciler::new(schema, config).unwrap();
//!
//! reconciler
//!     .apply(&[TableUpdate::new("Message", vec![RowOperation::insert(json!([5, "old"]))])])
//!     .unwrap();
//! let summary = reconciler
//!     .apply(&[TableUpdate::new(
//!         "Message",
//!         vec![
//!             RowOperation::delete(json!([5, "old"])),
//!             RowOperation::insert(json!([5, "new"])),
//!         ],
//!     )])
//!     .unwrap();
//! assert_eq!(summary.updates, 1);
//! assert_eq!(reconciler.store().count("Message"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod error;
mod message;
mod reconciler;
mod store;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ListenerFn, ListenerId, Subscription};
pub use config::{ClientConfig, DEFAULT_MAX_HISTORY};
pub use error::{SyncError, SyncResult};
pub use message::{
    IdentityToken, OperationKind, RowOperation, ServerMessage, SubscriptionUpdate, TableUpdate,
    TransactionUpdate,
};
pub use reconciler::{ApplySummary, Reconciler};
pub use store::{ClientStore, TableSnapshot};
