//! Error types for the codec crate.

use thiserror::Error;

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors that can occur while decoding wire values or schema descriptions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The wire value does not have the shape the descriptor expects.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the descriptor expected.
        expected: String,
        /// A short rendering of the offending wire value.
        found: String,
    },

    /// A Sum value was not a single-entry mapping.
    #[error("invalid sum value: {message}")]
    InvalidSumValue {
        /// Description of the problem.
        message: String,
    },

    /// Sum variant index is outside the variant list.
    #[error("variant index {index} out of range (sum has {len} variants)")]
    VariantOutOfRange {
        /// The index found on the wire.
        index: usize,
        /// Number of declared variants.
        len: usize,
    },

    /// Ref index is outside the typespace.
    #[error("type reference {index} out of range (typespace has {len} types)")]
    RefOutOfRange {
        /// The referenced index.
        index: u32,
        /// Number of types in the typespace.
        len: usize,
    },

    /// A chain of Refs loops without reaching a concrete type.
    #[error("type reference {index} is part of a reference cycle")]
    RefCycle {
        /// The reference the chain started from.
        index: u32,
    },

    /// A Ref was encountered but no typespace was supplied.
    #[error("type reference {index} cannot be resolved without a typespace")]
    MissingTypespace {
        /// The referenced index.
        index: u32,
    },

    /// A descriptor used a tag this decoder does not know.
    #[error("unknown type tag: {tag}")]
    UnknownTypeTag {
        /// The unrecognized tag.
        tag: String,
    },

    /// A product field was absent from the wire value.
    #[error("missing field: {name}")]
    MissingField {
        /// Field name or position.
        name: String,
    },

    /// An integer did not fit the declared width.
    #[error("integer out of range for {kind}: {value}")]
    IntegerOutOfRange {
        /// The builtin kind, e.g. `U8`.
        kind: &'static str,
        /// The wire value as text.
        value: String,
    },

    /// An identity or address had the wrong number of bytes.
    #[error("{kind} must be {expected} bytes, got {actual}")]
    InvalidIdentifierLength {
        /// `identity` or `address`.
        kind: &'static str,
        /// Required length.
        expected: usize,
        /// Length found.
        actual: usize,
    },

    /// A hex string could not be decoded.
    #[error("invalid hex string: {message}")]
    InvalidHex {
        /// Description of the problem.
        message: String,
    },

    /// The schema description itself is malformed.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },
}

impl DecodeError {
    /// Create a type mismatch error, rendering the found value compactly.
    pub fn type_mismatch(expected: impl Into<String>, found: &serde_json::Value) -> Self {
        let mut found = found.to_string();
        if found.chars().count() > 64 {
            found = found.chars().take(61).collect();
            found.push_str("...");
        }
        Self::TypeMismatch {
            expected: expected.into(),
            found,
        }
    }

    /// Create an invalid sum value error.
    pub fn invalid_sum(message: impl Into<String>) -> Self {
        Self::InvalidSumValue {
            message: message.into(),
        }
    }

    /// Create an unknown type tag error.
    pub fn unknown_tag(tag: impl Into<String>) -> Self {
        Self::UnknownTypeTag { tag: tag.into() }
    }

    /// Create a missing field error.
    pub fn missing_field(name: impl Into<String>) -> Self {
        Self::MissingField { name: name.into() }
    }

    /// Create an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Returns true if the error points at the schema rather than the value.
    ///
    /// Out-of-range indices, reference cycles, unknown tags, a missing
    /// typespace and malformed schema descriptions are configuration
    /// problems; everything else is a malformed wire value.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            DecodeError::VariantOutOfRange { .. }
                | DecodeError::RefOutOfRange { .. }
                | DecodeError::RefCycle { .. }
                | DecodeError::MissingTypespace { .. }
                | DecodeError::UnknownTypeTag { .. }
                | DecodeError::InvalidSchema { .. }
        )
    }
}
