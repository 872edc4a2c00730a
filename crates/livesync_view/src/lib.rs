//! # Livesync View
//!
//! Incrementally maintained filtered views for livesync.
//!
//! This crate provides:
//! - [`LiveFilter`], the subset of a keyed source that passes a predicate
//! - Output storages: keyed map, insertion-ordered entries, key set
//! - The [`EventSource`] seam, with a manual [`EventHub`] and a
//!   [`FeedSource`] over a livesync change feed
//! - [`table_filter`], a live filter over one reconciled table
//!
//! ## Maintenance model
//!
//! Row events are applied one at a time. Replacing the predicate or
//! refetching the source only marks the view dirty; the next read or event
//! runs one full refilter. The first scan is deferred until the view is
//! first used.
//!
//! ## Usage
//!
//! ```
//! use livesync_view::{predicate, EventHub, LiveFilter, MapStorage};
//!
//! let hub = EventHub::new();
//! let view = LiveFilter::new(
//!     || vec![(1, "hi".to_string()), (2, "bye".to_string())],
//!     Some(predicate(|s: &String| s.len() > 2)),
//!     hub.clone(),
//!     MapStorage::new(),
//! );
//! assert_eq!(view.len().unwrap(), 1);
//!
//! hub.emit_insert(&3, &"yo!".to_string());
//! assert!(view.contains(&3).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod filter;
mod source;
mod storage;
mod table;

pub use error::{ViewError, ViewResult};
pub use filter::{predicate, LiveFilter, Predicate, SourceFn};
pub use source::{
    DeleteHandler, EventHub, EventSource, InsertHandler, RefetchHandler, Registration,
    UpdateHandler,
};
pub use storage::{EntryStorage, FilterStorage, KeySetStorage, MapStorage};
pub use table::{table_filter, table_filter_with, FeedSource, TableFilter, TableRow};
