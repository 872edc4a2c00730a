//! Schema-driven value decoder.

use serde_json::Value;

use crate::error::{DecodeError, DecodeResult};
use crate::types::{
    BuiltinType, Element, EntitySchema, ProductType, SumType, TypeDescriptor, Typespace,
    ADDRESS_FIELD, IDENTITY_FIELD,
};
use crate::value::{Address, DomainValue, Identity};

/// Decode a raw wire value against a type descriptor.
///
/// Pure and deterministic: identical inputs always produce structurally equal
/// output. Nothing is cached between calls.
///
/// # Errors
///
/// Returns an error if the wire value does not match the descriptor, a
/// Sum/Ref index is out of range, or a Ref is used without a typespace.
pub fn decode(
    ty: &TypeDescriptor,
    raw: &Value,
    typespace: Option<&Typespace>,
) -> DecodeResult<DomainValue> {
    SchemaDecoder::new(typespace).decode(ty, raw)
}

/// Decode a full table row against an entity's column schema.
///
/// Unlike a nested [`TypeDescriptor::Product`], a row always decodes to a
/// [`DomainValue::Product`], even when the entity has no columns.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_row(
    entity: &EntitySchema,
    raw: &Value,
    typespace: Option<&Typespace>,
) -> DecodeResult<DomainValue> {
    SchemaDecoder::new(typespace)
        .decode_fields(&entity.elements, raw)
        .map(DomainValue::Product)
}

/// Decode a Sum value keeping the selected variant.
///
/// [`decode`] discards the variant tag and returns only the inner value; this
/// is the entry point for callers that need to tell same-shaped variants apart.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_sum_tagged(
    sum: &SumType,
    raw: &Value,
    typespace: Option<&Typespace>,
) -> DecodeResult<TaggedValue> {
    SchemaDecoder::new(typespace).decode_sum_tagged(sum, raw)
}

/// A decoded Sum value together with its variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedValue {
    /// Index of the selected variant.
    pub index: usize,
    /// Name of the selected variant, if it has one.
    pub name: Option<String>,
    /// The decoded inner value.
    pub value: DomainValue,
}

/// A decoder bound to an optional typespace.
#[derive(Debug, Clone, Copy)]
pub struct SchemaDecoder<'a> {
    typespace: Option<&'a Typespace>,
}

impl<'a> SchemaDecoder<'a> {
    /// Create a decoder resolving references against `typespace`.
    pub fn new(typespace: Option<&'a Typespace>) -> Self {
        Self { typespace }
    }

    /// Decode `raw` against `ty`.
    pub fn decode(&self, ty: &TypeDescriptor, raw: &Value) -> DecodeResult<DomainValue> {
        match ty {
            TypeDescriptor::Product(product) => self.decode_product(product, raw),
            TypeDescriptor::Sum(sum) => self.decode_sum_tagged(sum, raw).map(|t| t.value),
            TypeDescriptor::Builtin(builtin) => self.decode_builtin(builtin, raw),
            TypeDescriptor::Ref(index) => self.decode(self.resolve_ref(*index)?, raw),
        }
    }

    /// Follows a chain of references to the first non-reference descriptor.
    ///
    /// A chain longer than the typespace must revisit an entry, so it can
    /// never reach a concrete type.
    fn resolve_ref(&self, index: u32) -> DecodeResult<&'a TypeDescriptor> {
        let typespace = self
            .typespace
            .ok_or(DecodeError::MissingTypespace { index })?;
        let mut current = index;
        let mut hops = 0usize;
        loop {
            match typespace.resolve(current)? {
                TypeDescriptor::Ref(next) => {
                    hops += 1;
                    if hops > typespace.len() {
                        return Err(DecodeError::RefCycle { index });
                    }
                    current = *next;
                }
                resolved => return Ok(resolved),
            }
        }
    }

    fn decode_product(&self, product: &ProductType, raw: &Value) -> DecodeResult<DomainValue> {
        if product.elements.is_empty() {
            return Ok(DomainValue::Null);
        }
        if let Some(wrapped) = self.decode_wrapper(product, raw)? {
            return Ok(wrapped);
        }
        self.decode_fields(&product.elements, raw)
            .map(DomainValue::Product)
    }

    /// Recognizes the identity/address wrapper convention.
    fn decode_wrapper(&self, product: &ProductType, raw: &Value) -> DecodeResult<Option<DomainValue>> {
        let [only] = product.elements.as_slice() else {
            return Ok(None);
        };
        let field = match only.name.as_deref() {
            Some(IDENTITY_FIELD) => IDENTITY_FIELD,
            Some(ADDRESS_FIELD) => ADDRESS_FIELD,
            _ => return Ok(None),
        };
        let inner = match raw {
            Value::Array(items) if items.len() == 1 => &items[0],
            Value::Object(map) => map
                .get(field)
                .ok_or_else(|| DecodeError::missing_field(field))?,
            other => return Err(DecodeError::type_mismatch(field, other)),
        };
        let bytes = raw_bytes(inner, field)?;
        let value = if field == IDENTITY_FIELD {
            DomainValue::Identity(Identity::from_slice(&bytes)?)
        } else {
            DomainValue::Address(Address::from_slice(&bytes)?)
        };
        Ok(Some(value))
    }

    /// Decode fields positionally (array) or by name (object).
    fn decode_fields(&self, elements: &[Element], raw: &Value) -> DecodeResult<Vec<(String, DomainValue)>> {
        match raw {
            Value::Array(items) => {
                if items.len() != elements.len() {
                    return Err(DecodeError::type_mismatch(
                        format!("product of {} fields", elements.len()),
                        raw,
                    ));
                }
                elements
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (element, item))| Ok((element.label(i), self.decode(&element.ty, item)?)))
                    .collect()
            }
            Value::Object(map) => elements
                .iter()
                .enumerate()
                .map(|(i, element)| {
                    let label = element.label(i);
                    let item = map
                        .get(&label)
                        .ok_or_else(|| DecodeError::missing_field(label.as_str()))?;
                    let value = self.decode(&element.ty, item)?;
                    Ok((label, value))
                })
                .collect(),
            other => Err(DecodeError::type_mismatch("product", other)),
        }
    }

    fn decode_sum_tagged(&self, sum: &SumType, raw: &Value) -> DecodeResult<TaggedValue> {
        let map = raw
            .as_object()
            .ok_or_else(|| DecodeError::invalid_sum(format!("expected {{\"<index>\": value}}, got {raw}")))?;
        let mut entries = map.iter();
        let (tag, inner) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(DecodeError::invalid_sum(format!(
                    "expected exactly one variant entry, got {}",
                    map.len()
                )))
            }
        };
        let index: usize = tag
            .parse()
            .map_err(|_| DecodeError::invalid_sum(format!("variant tag {tag:?} is not an index")))?;
        let variant = sum.variants.get(index).ok_or(DecodeError::VariantOutOfRange {
            index,
            len: sum.variants.len(),
        })?;
        Ok(TaggedValue {
            index,
            name: variant.name.clone(),
            value: self.decode(&variant.ty, inner)?,
        })
    }

    fn decode_builtin(&self, builtin: &BuiltinType, raw: &Value) -> DecodeResult<DomainValue> {
        match builtin {
            BuiltinType::Bool => match raw {
                Value::Bool(b) => Ok(DomainValue::Bool(*b)),
                Value::Number(n) => Ok(DomainValue::Bool(n.as_f64().is_some_and(|x| x != 0.0))),
                Value::String(s) if s == "true" || s == "false" => Ok(DomainValue::Bool(s == "true")),
                other => Err(DecodeError::type_mismatch("Bool", other)),
            },
            BuiltinType::String => match raw {
                Value::String(s) => Ok(DomainValue::String(s.clone())),
                Value::Number(n) => Ok(DomainValue::String(n.to_string())),
                Value::Bool(b) => Ok(DomainValue::String(b.to_string())),
                other => Err(DecodeError::type_mismatch("String", other)),
            },
            BuiltinType::I8 => narrow::<i8>(builtin, raw).map(|n| DomainValue::Int(n.into())),
            BuiltinType::U8 => narrow::<u8>(builtin, raw).map(|n| DomainValue::Int(n.into())),
            BuiltinType::I16 => narrow::<i16>(builtin, raw).map(|n| DomainValue::Int(n.into())),
            BuiltinType::U16 => narrow::<u16>(builtin, raw).map(|n| DomainValue::Int(n.into())),
            BuiltinType::I32 => narrow::<i32>(builtin, raw).map(|n| DomainValue::Int(n.into())),
            BuiltinType::U32 => narrow::<u32>(builtin, raw).map(|n| DomainValue::Int(n.into())),
            BuiltinType::I64 => narrow::<i64>(builtin, raw).map(|n| DomainValue::BigInt(n.into())),
            BuiltinType::U64 => narrow::<u64>(builtin, raw).map(|n| DomainValue::BigUint(n.into())),
            BuiltinType::I128 => narrow::<i128>(builtin, raw).map(DomainValue::BigInt),
            BuiltinType::U128 => narrow::<u128>(builtin, raw).map(DomainValue::BigUint),
            BuiltinType::F32 => {
                #[allow(clippy::cast_possible_truncation)]
                let narrowed = wire_float(raw, "F32")? as f32;
                Ok(DomainValue::Float(f64::from(narrowed)))
            }
            BuiltinType::F64 => wire_float(raw, "F64").map(DomainValue::Float),
            BuiltinType::Bytes => raw_bytes(raw, "UInt8Array").map(DomainValue::Bytes),
            BuiltinType::Array(inner) => {
                // Byte arrays travel as hex strings.
                if let (TypeDescriptor::Builtin(BuiltinType::U8), Value::String(_)) = (inner.as_ref(), raw) {
                    return raw_bytes(raw, "Array<U8>").map(DomainValue::Bytes);
                }
                let items = raw
                    .as_array()
                    .ok_or_else(|| DecodeError::type_mismatch(format!("Array<{inner}>"), raw))?;
                items
                    .iter()
                    .map(|item| self.decode(inner, item))
                    .collect::<DecodeResult<_>>()
                    .map(DomainValue::Array)
            }
            BuiltinType::Map { key, value } => {
                let entries = match raw {
                    Value::Object(map) => map
                        .iter()
                        .map(|(k, v)| {
                            Ok((self.decode(key, &Value::String(k.clone()))?, self.decode(value, v)?))
                        })
                        .collect::<DecodeResult<Vec<_>>>()?,
                    Value::Array(pairs) => pairs
                        .iter()
                        .map(|pair| match pair.as_array().map(Vec::as_slice) {
                            Some([k, v]) => Ok((self.decode(key, k)?, self.decode(value, v)?)),
                            _ => Err(DecodeError::type_mismatch("[key, value] pair", pair)),
                        })
                        .collect::<DecodeResult<Vec<_>>>()?,
                    other => {
                        return Err(DecodeError::type_mismatch(format!("Map<{key}, {value}>"), other))
                    }
                };
                Ok(DomainValue::Map(entries))
            }
        }
    }
}

/// An integer as it appeared on the wire, before narrowing.
enum WireInt {
    Signed(i128),
    Unsigned(u128),
}

fn wire_integer(raw: &Value, kind: &str) -> DecodeResult<WireInt> {
    let text = match raw {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                return Ok(WireInt::Signed(v.into()));
            }
            if let Some(v) = n.as_u64() {
                return Ok(WireInt::Unsigned(v.into()));
            }
            n.to_string()
        }
        Value::String(s) => s.trim().to_string(),
        other => return Err(DecodeError::type_mismatch(kind, other)),
    };
    if let Ok(v) = text.parse::<i128>() {
        return Ok(WireInt::Signed(v));
    }
    text.parse::<u128>()
        .map(WireInt::Unsigned)
        .map_err(|_| DecodeError::type_mismatch(kind, raw))
}

fn narrow<T>(builtin: &BuiltinType, raw: &Value) -> DecodeResult<T>
where
    T: TryFrom<i128> + TryFrom<u128>,
{
    let kind = builtin.tag();
    let narrowed = match wire_integer(raw, kind)? {
        WireInt::Signed(v) => T::try_from(v).ok(),
        WireInt::Unsigned(v) => T::try_from(v).ok(),
    };
    narrowed.ok_or_else(|| DecodeError::IntegerOutOfRange {
        kind,
        value: match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    })
}

fn wire_float(raw: &Value, kind: &str) -> DecodeResult<f64> {
    match raw {
        Value::Number(n) => n.as_f64().ok_or_else(|| DecodeError::type_mismatch(kind, raw)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| DecodeError::type_mismatch(kind, raw)),
        other => Err(DecodeError::type_mismatch(kind, other)),
    }
}

/// Bytes from a hex string or an array of byte-sized numbers.
fn raw_bytes(raw: &Value, kind: &str) -> DecodeResult<Vec<u8>> {
    match raw {
        Value::String(s) => hex::decode(s.trim_start_matches("0x")).map_err(|e| DecodeError::InvalidHex {
            message: e.to_string(),
        }),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| DecodeError::type_mismatch(format!("{kind} byte"), item))
            })
            .collect(),
        other => Err(DecodeError::type_mismatch(kind, other)),
    }
}
