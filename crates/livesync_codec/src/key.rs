//! Canonical row keys.
//!
//! A [`RowKey`] is the identity of a row as it travels on the wire. It is
//! derived from the raw (undecoded) JSON value with a canonical CBOR-style
//! encoding, so two raw values that differ only in object key order produce
//! the same key, and the key is cheap to hash, compare and order.
//!
//! ## Encoding Rules
//!
//! - Integers use the shortest encoding; values beyond 64 bits become
//!   tagged big-endian bignums
//! - Integral floats within 64-bit range (`5.0`, `5e0`, `-0.0`) take the
//!   integer encoding; other numbers are encoded as 64-bit floats
//! - Object entries are sorted by encoded key (length-first, then bytewise)
//! - No indefinite-length items

use std::fmt;

use serde_json::{Number, Value};

/// Opaque, hashable, totally ordered row identity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey(Vec<u8>);

impl RowKey {
    /// Derive the key of a raw wire value.
    pub fn from_raw(raw: &Value) -> Self {
        let mut encoder = KeyEncoder::with_capacity(32);
        encoder.encode(raw);
        Self(encoder.buffer)
    }

    /// Wrap already-encoded key bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The encoded key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering of the key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowKey({})", self.to_hex())
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<&Value> for RowKey {
    fn from(raw: &Value) -> Self {
        Self::from_raw(raw)
    }
}

struct KeyEncoder {
    buffer: Vec<u8>,
}

impl KeyEncoder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    fn encode(&mut self, value: &Value) {
        match value {
            // simple values 20/21/22
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Number(n) => self.encode_number(n),
            Value::String(s) => {
                self.encode_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.encode_head(4, items.len() as u64);
                for item in items {
                    self.encode(item);
                }
            }
            Value::Object(map) => {
                let mut entries: Vec<(Vec<u8>, &Value)> = map
                    .iter()
                    .map(|(k, v)| {
                        let mut key = KeyEncoder::with_capacity(k.len() + 1);
                        key.encode_head(3, k.len() as u64);
                        key.buffer.extend_from_slice(k.as_bytes());
                        (key.buffer, v)
                    })
                    .collect();
                entries.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

                self.encode_head(5, entries.len() as u64);
                for (key, v) in entries {
                    self.buffer.extend_from_slice(&key);
                    self.encode(v);
                }
            }
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_number(&mut self, n: &Number) {
        if let Some(v) = n.as_u64() {
            self.encode_head(0, v);
        } else if let Some(v) = n.as_i64() {
            // negative integers encode -(n+1)
            self.encode_head(1, (-(v + 1)) as u64);
        } else if let Ok(v) = n.to_string().parse::<i128>() {
            if v >= 0 {
                self.encode_bignum(2, v as u128);
            } else {
                self.encode_bignum(3, (-(v + 1)) as u128);
            }
        } else if let Ok(v) = n.to_string().parse::<u128>() {
            self.encode_bignum(2, v);
        } else {
            self.encode_float(n.as_f64().unwrap_or(f64::NAN));
        }
    }

    /// Integral floats take the integer encoding, so `5.0` keys like `5`
    /// and `-0.0` like `0`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
    fn encode_float(&mut self, x: f64) {
        const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;
        const MIN_I64: f64 = -9_223_372_036_854_775_808.0;

        if x.is_finite() && x.fract() == 0.0 {
            if (0.0..TWO_POW_64).contains(&x) {
                self.encode_head(0, x as u64);
                return;
            }
            if (MIN_I64..0.0).contains(&x) {
                let v = x as i64;
                self.encode_head(1, (-(v + 1)) as u64);
                return;
            }
        }
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&x.to_bits().to_be_bytes());
    }

    fn encode_bignum(&mut self, tag: u64, value: u128) {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        self.encode_head(6, tag);
        self.encode_head(2, (bytes.len() - first) as u64);
        self.buffer.extend_from_slice(&bytes[first..]);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_head(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }
}
