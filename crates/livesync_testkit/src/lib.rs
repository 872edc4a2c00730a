//! # Livesync Testkit
//!
//! Test utilities for livesync.
//!
//! This crate provides:
//! - Schema fixtures (the chat module and a minimal two-table schema)
//! - Raw row and server message builders
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```
//! use livesync_testkit::prelude::*;
//!
//! let schema = simple_schema();
//! let msg = transaction_update(vec![table_update(
//!     "Message",
//!     vec![delete_op(message_row(5, "old")), insert_op(message_row(5, "new"))],
//! )]);
//! assert!(schema.entity("Message").is_some());
//! assert!(msg.get("TransactionUpdate").is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
