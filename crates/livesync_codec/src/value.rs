//! Decoded domain values.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{DecodeError, DecodeResult};

/// A 32-byte client identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity([u8; 32]);

/// A 16-byte connection address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 16]);

macro_rules! opaque_id {
    ($ty:ident, $len:expr, $kind:literal) => {
        impl $ty {
            /// Number of bytes in this identifier.
            pub const LEN: usize = $len;

            /// Creates the identifier from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Creates the identifier from a slice, checking its length.
            pub fn from_slice(bytes: &[u8]) -> DecodeResult<Self> {
                let array: [u8; $len] =
                    bytes
                        .try_into()
                        .map_err(|_| DecodeError::InvalidIdentifierLength {
                            kind: $kind,
                            expected: $len,
                            actual: bytes.len(),
                        })?;
                Ok(Self(array))
            }

            /// Parses the identifier from a hex string.
            pub fn from_hex(hex_str: &str) -> DecodeResult<Self> {
                let bytes = hex::decode(hex_str).map_err(|e| DecodeError::InvalidHex {
                    message: e.to_string(),
                })?;
                Self::from_slice(&bytes)
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex rendering.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self.to_hex())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }
    };
}

opaque_id!(Identity, 32, "identity");
opaque_id!(Address, 16, "address");

/// A decoded, typed value.
///
/// Integers up to 32 bits land in [`DomainValue::Int`]; 64- and 128-bit
/// integers always land in [`DomainValue::BigInt`] / [`DomainValue::BigUint`]
/// so no precision is lost through floating point.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainValue {
    /// Absent value (empty product, unit variant).
    Null,
    /// Boolean.
    Bool(bool),
    /// Text.
    String(String),
    /// 8-32 bit integer.
    Int(i64),
    /// 32/64-bit float.
    Float(f64),
    /// Signed 64/128-bit integer.
    BigInt(i128),
    /// Unsigned 64/128-bit integer.
    BigUint(u128),
    /// Byte buffer.
    Bytes(Vec<u8>),
    /// Homogeneous array.
    Array(Vec<DomainValue>),
    /// Map entries in wire order.
    Map(Vec<(DomainValue, DomainValue)>),
    /// Record with fields in declaration order.
    Product(Vec<(String, DomainValue)>),
    /// Client identity.
    Identity(Identity),
    /// Connection address.
    Address(Address),
}

impl DomainValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, DomainValue::Null)
    }

    /// Look up a field of a product value.
    pub fn get(&self, field: &str) -> Option<&DomainValue> {
        match self {
            DomainValue::Product(fields) => {
                fields.iter().find(|(name, _)| name == field).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DomainValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DomainValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an `i64`, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DomainValue::Int(n) => Some(*n),
            DomainValue::BigInt(n) => i64::try_from(*n).ok(),
            DomainValue::BigUint(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Get this value as an `i128`, if it is an integer that fits.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            DomainValue::Int(n) => Some(i128::from(*n)),
            DomainValue::BigInt(n) => Some(*n),
            DomainValue::BigUint(n) => i128::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Get this value as a `u128`, if it is a non-negative integer.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            DomainValue::Int(n) => u128::try_from(*n).ok(),
            DomainValue::BigInt(n) => u128::try_from(*n).ok(),
            DomainValue::BigUint(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as an `f64`, if it is numeric.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DomainValue::Float(x) => Some(*x),
            DomainValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte buffer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DomainValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[DomainValue]> {
        match self {
            DomainValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value's fields, if it is a product.
    pub fn as_product(&self) -> Option<&[(String, DomainValue)]> {
        match self {
            DomainValue::Product(fields) => Some(fields),
            _ => None,
        }
    }

    /// Get this value as an identity, if it is one.
    pub fn as_identity(&self) -> Option<&Identity> {
        match self {
            DomainValue::Identity(id) => Some(id),
            _ => None,
        }
    }

    /// Get this value as an address, if it is one.
    pub fn as_address(&self) -> Option<&Address> {
        match self {
            DomainValue::Address(addr) => Some(addr),
            _ => None,
        }
    }

    /// Renders this value as plain JSON for display.
    ///
    /// 64- and 128-bit integers become decimal strings, bytes and
    /// identifiers become hex strings, maps become `[key, value]` pairs.
    pub fn to_json(&self) -> Value {
        match self {
            DomainValue::Null => Value::Null,
            DomainValue::Bool(b) => Value::Bool(*b),
            DomainValue::String(s) => Value::String(s.clone()),
            DomainValue::Int(n) => Value::from(*n),
            DomainValue::Float(x) => Value::from(*x),
            DomainValue::BigInt(n) => Value::String(n.to_string()),
            DomainValue::BigUint(n) => Value::String(n.to_string()),
            DomainValue::Bytes(b) => Value::String(hex::encode(b)),
            DomainValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            DomainValue::Map(entries) => Value::Array(
                entries
                    .iter()
                    .map(|(k, v)| Value::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
            DomainValue::Product(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, v)| (name.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            DomainValue::Identity(id) => Value::String(id.to_hex()),
            DomainValue::Address(addr) => Value::String(addr.to_hex()),
        }
    }
}

impl From<bool> for DomainValue {
    fn from(b: bool) -> Self {
        DomainValue::Bool(b)
    }
}

impl From<i64> for DomainValue {
    fn from(n: i64) -> Self {
        DomainValue::Int(n)
    }
}

impl From<&str> for DomainValue {
    fn from(s: &str) -> Self {
        DomainValue::String(s.to_string())
    }
}

impl From<String> for DomainValue {
    fn from(s: String) -> Self {
        DomainValue::String(s)
    }
}

impl From<Identity> for DomainValue {
    fn from(id: Identity) -> Self {
        DomainValue::Identity(id)
    }
}
