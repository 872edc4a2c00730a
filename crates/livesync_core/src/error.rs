//! Error types for the reconciler.

use livesync_codec::DecodeError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while applying server updates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// A row in a table batch failed to decode; the table was left untouched.
    #[error("failed to decode rows of table {table}: {source}")]
    Decode {
        /// Table whose batch was aborted.
        table: String,
        /// The underlying decode failure.
        source: DecodeError,
    },

    /// The schema or client configuration does not fit the data.
    #[error("schema configuration error: {message}")]
    SchemaConfig {
        /// Description of the problem.
        message: String,
    },

    /// A server message could not be parsed.
    #[error("malformed server message: {message}")]
    Message {
        /// Description of the problem.
        message: String,
    },
}

impl SyncError {
    /// Create a decode error scoped to a table.
    pub fn decode(table: impl Into<String>, source: DecodeError) -> Self {
        Self::Decode {
            table: table.into(),
            source,
        }
    }

    /// Create a schema configuration error.
    pub fn schema_config(message: impl Into<String>) -> Self {
        Self::SchemaConfig {
            message: message.into(),
        }
    }

    /// Create a malformed message error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Returns true if the error is a schema configuration problem.
    ///
    /// Decode failures caused by out-of-range indices or unknown tags count
    /// as configuration problems too.
    pub fn is_schema_error(&self) -> bool {
        match self {
            SyncError::SchemaConfig { .. } => true,
            SyncError::Decode { source, .. } => source.is_schema_error(),
            SyncError::Message { .. } => false,
        }
    }

    /// The table the error is scoped to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            SyncError::Decode { table, .. } => Some(table),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let err = SyncError::decode("Message", DecodeError::missing_field("text"));
        assert_eq!(
            err.to_string(),
            "failed to decode rows of table Message: missing field: text"
        );
        assert_eq!(err.table(), Some("Message"));
    }

    #[test]
    fn schema_error_classification() {
        assert!(SyncError::schema_config("no such column").is_schema_error());
        assert!(SyncError::decode("T", DecodeError::RefOutOfRange { index: 9, len: 1 })
            .is_schema_error());
        assert!(!SyncError::decode("T", DecodeError::missing_field("x")).is_schema_error());
        assert!(!SyncError::message("bad tag").is_schema_error());
    }
}
