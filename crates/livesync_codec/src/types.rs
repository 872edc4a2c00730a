//! Type descriptors, typespaces and entity schemas.
//!
//! These mirror the server's algebraic type model. They are parsed from the
//! expanded schema description JSON and drive [`crate::decode`].

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{DecodeError, DecodeResult};

/// Field name reserved for the identity wrapper product.
pub const IDENTITY_FIELD: &str = "__identity_bytes";

/// Field name reserved for the address wrapper product.
pub const ADDRESS_FIELD: &str = "__address_bytes";

/// Describes how to decode a wire value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// Positional or named composite.
    Product(ProductType),
    /// Tagged union.
    Sum(SumType),
    /// Primitive or container builtin.
    Builtin(BuiltinType),
    /// Indirection into a [`Typespace`].
    Ref(u32),
}

/// A product (record) type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductType {
    /// Ordered fields.
    pub elements: Vec<Element>,
}

/// A sum (tagged union) type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SumType {
    /// Ordered variants; the wire tag is the index into this list.
    pub variants: Vec<Element>,
}

/// A named (or unnamed) member of a product or sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Field or variant name, absent for positional members.
    pub name: Option<String>,
    /// The member's type.
    pub ty: TypeDescriptor,
}

/// Builtin types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinType {
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 128-bit integer.
    I128,
    /// Unsigned 128-bit integer.
    U128,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Byte array.
    Bytes,
    /// Homogeneous array.
    Array(Box<TypeDescriptor>),
    /// Map from keys to values.
    Map {
        /// Key type.
        key: Box<TypeDescriptor>,
        /// Value type.
        value: Box<TypeDescriptor>,
    },
}

impl BuiltinType {
    /// The wire tag for this builtin.
    pub fn tag(&self) -> &'static str {
        match self {
            BuiltinType::Bool => "Bool",
            BuiltinType::String => "String",
            BuiltinType::I8 => "I8",
            BuiltinType::U8 => "U8",
            BuiltinType::I16 => "I16",
            BuiltinType::U16 => "U16",
            BuiltinType::I32 => "I32",
            BuiltinType::U32 => "U32",
            BuiltinType::I64 => "I64",
            BuiltinType::U64 => "U64",
            BuiltinType::I128 => "I128",
            BuiltinType::U128 => "U128",
            BuiltinType::F32 => "F32",
            BuiltinType::F64 => "F64",
            BuiltinType::Bytes => "UInt8Array",
            BuiltinType::Array(_) => "Array",
            BuiltinType::Map { .. } => "Map",
        }
    }

    fn from_json(value: &Value) -> DecodeResult<Self> {
        // Plain string tags are accepted for the parameterless builtins.
        if let Value::String(tag) = value {
            return Self::simple(tag).ok_or_else(|| DecodeError::unknown_tag(tag.as_str()));
        }
        let (tag, inner) = single_entry(value, "builtin")?;
        if let Some(simple) = Self::simple(tag) {
            return Ok(simple);
        }
        match tag {
            "Array" => Ok(BuiltinType::Array(Box::new(TypeDescriptor::from_json(inner)?))),
            "Map" => {
                let key = inner
                    .get("key")
                    .ok_or_else(|| DecodeError::invalid_schema("map type without key"))?;
                let value = inner
                    .get("value")
                    .ok_or_else(|| DecodeError::invalid_schema("map type without value"))?;
                Ok(BuiltinType::Map {
                    key: Box::new(TypeDescriptor::from_json(key)?),
                    value: Box::new(TypeDescriptor::from_json(value)?),
                })
            }
            other => Err(DecodeError::unknown_tag(other)),
        }
    }

    fn simple(tag: &str) -> Option<Self> {
        let ty = match tag {
            "Bool" => BuiltinType::Bool,
            "String" => BuiltinType::String,
            "I8" => BuiltinType::I8,
            "U8" | "Byte" => BuiltinType::U8,
            "I16" => BuiltinType::I16,
            "U16" => BuiltinType::U16,
            "I32" => BuiltinType::I32,
            "U32" => BuiltinType::U32,
            "I64" => BuiltinType::I64,
            "U64" => BuiltinType::U64,
            "I128" => BuiltinType::I128,
            "U128" => BuiltinType::U128,
            "F32" => BuiltinType::F32,
            "F64" => BuiltinType::F64,
            "UInt8Array" | "Bytes" => BuiltinType::Bytes,
            _ => return None,
        };
        Some(ty)
    }
}

impl TypeDescriptor {
    /// Shorthand for a builtin descriptor.
    pub fn builtin(ty: BuiltinType) -> Self {
        TypeDescriptor::Builtin(ty)
    }

    /// Shorthand for an array of `element`.
    pub fn array(element: TypeDescriptor) -> Self {
        TypeDescriptor::Builtin(BuiltinType::Array(Box::new(element)))
    }

    /// Shorthand for a product of named fields.
    pub fn product<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeDescriptor)>,
        S: Into<String>,
    {
        TypeDescriptor::Product(ProductType {
            elements: fields.into_iter().map(|(n, ty)| Element::named(n, ty)).collect(),
        })
    }

    /// Shorthand for a sum of named variants.
    pub fn sum<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeDescriptor)>,
        S: Into<String>,
    {
        TypeDescriptor::Sum(SumType {
            variants: variants
                .into_iter()
                .map(|(n, ty)| Element::named(n, ty))
                .collect(),
        })
    }

    /// The identity wrapper product.
    pub fn identity() -> Self {
        Self::product([(IDENTITY_FIELD, Self::array(Self::builtin(BuiltinType::U8)))])
    }

    /// The address wrapper product.
    pub fn address() -> Self {
        Self::product([(ADDRESS_FIELD, Self::array(Self::builtin(BuiltinType::U8)))])
    }

    /// Parse a descriptor from its JSON form, e.g. `{"Builtin": {"U64": []}}`.
    pub fn from_json(value: &Value) -> DecodeResult<Self> {
        let (tag, inner) = single_entry(value, "type descriptor")?;
        match tag {
            "Product" => Ok(TypeDescriptor::Product(ProductType {
                elements: parse_elements(inner, "elements")?,
            })),
            "Sum" => Ok(TypeDescriptor::Sum(SumType {
                variants: parse_elements(inner, "variants")?,
            })),
            "Builtin" => Ok(TypeDescriptor::Builtin(BuiltinType::from_json(inner)?)),
            "Ref" => {
                let index = inner
                    .as_u64()
                    .and_then(|i| u32::try_from(i).ok())
                    .ok_or_else(|| DecodeError::invalid_schema(format!("bad ref index {inner}")))?;
                Ok(TypeDescriptor::Ref(index))
            }
            other => Err(DecodeError::unknown_tag(other)),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Product(p) => {
                write!(f, "(")?;
                for (i, e) in p.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", e.label(i), e.ty)?;
                }
                write!(f, ")")
            }
            TypeDescriptor::Sum(s) => {
                for (i, v) in s.variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}({})", v.label(i), v.ty)?;
                }
                Ok(())
            }
            TypeDescriptor::Builtin(BuiltinType::Array(inner)) => write!(f, "Array<{inner}>"),
            TypeDescriptor::Builtin(BuiltinType::Map { key, value }) => {
                write!(f, "Map<{key}, {value}>")
            }
            TypeDescriptor::Builtin(b) => write!(f, "{}", b.tag()),
            TypeDescriptor::Ref(i) => write!(f, "&{i}"),
        }
    }
}

impl Element {
    /// Creates a named element.
    pub fn named(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    /// Name used for this element in decoded output; positional members use their index.
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| index.to_string())
    }

    fn from_json(value: &Value) -> DecodeResult<Self> {
        let ty = value
            .get("algebraic_type")
            .ok_or_else(|| DecodeError::invalid_schema("element without algebraic_type"))?;
        let name = match value.get("name") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(o)) => match o.get("some") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => {
                    return Err(DecodeError::invalid_schema(format!(
                        "element name must be a string, got {other}"
                    )))
                }
                None => None,
            },
            Some(other) => {
                return Err(DecodeError::invalid_schema(format!(
                    "unrecognized element name {other}"
                )))
            }
        };
        Ok(Self {
            name,
            ty: TypeDescriptor::from_json(ty)?,
        })
    }
}

/// Ordered list of shared type descriptors addressed by [`TypeDescriptor::Ref`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Typespace {
    types: Vec<TypeDescriptor>,
}

impl Typespace {
    /// Creates a typespace from descriptors.
    pub fn new(types: Vec<TypeDescriptor>) -> Self {
        Self { types }
    }

    /// Resolves a reference.
    pub fn resolve(&self, index: u32) -> DecodeResult<&TypeDescriptor> {
        self.types
            .get(index as usize)
            .ok_or(DecodeError::RefOutOfRange {
                index,
                len: self.types.len(),
            })
    }

    /// Number of types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if the typespace is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Parses a typespace from a JSON array of descriptors.
    pub fn from_json(value: &Value) -> DecodeResult<Self> {
        // Newer servers wrap the list as {"types": [...]}.
        let list = match value {
            Value::Object(o) => o.get("types").unwrap_or(value),
            _ => value,
        };
        let items = list
            .as_array()
            .ok_or_else(|| DecodeError::invalid_schema("typespace must be an array"))?;
        Ok(Self {
            types: items
                .iter()
                .map(TypeDescriptor::from_json)
                .collect::<DecodeResult<_>>()?,
        })
    }
}

/// Kind of schema entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A table whose rows are replicated to the client.
    Table,
    /// A reducer (server function); never carries rows.
    Reducer,
}

/// Per-entity metadata from the schema description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    /// Table or reducer.
    pub kind: EntityKind,
    /// Number of columns / arguments.
    pub arity: usize,
    /// Ordered, typed columns.
    pub elements: Vec<Element>,
}

impl EntitySchema {
    /// Creates a table schema from named columns.
    pub fn table<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeDescriptor)>,
        S: Into<String>,
    {
        let elements: Vec<Element> = columns
            .into_iter()
            .map(|(n, ty)| Element::named(n, ty))
            .collect();
        Self {
            kind: EntityKind::Table,
            arity: elements.len(),
            elements,
        }
    }

    /// Position of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| e.name.as_deref() == Some(name))
    }

    fn from_json(name: &str, value: &Value) -> DecodeResult<Self> {
        let kind = match value.get("type").and_then(Value::as_str) {
            Some("table") => EntityKind::Table,
            Some("reducer") => EntityKind::Reducer,
            other => {
                return Err(DecodeError::invalid_schema(format!(
                    "entity {name} has unknown type {other:?}"
                )))
            }
        };
        let schema = value
            .get("schema")
            .ok_or_else(|| DecodeError::invalid_schema(format!("entity {name} has no schema")))?;
        let elements = parse_elements(schema, "elements")?;
        let arity = match value.get("arity").and_then(Value::as_u64) {
            Some(n) => usize::try_from(n)
                .map_err(|_| DecodeError::invalid_schema(format!("entity {name} arity too large")))?,
            None => elements.len(),
        };
        Ok(Self {
            kind,
            arity,
            elements,
        })
    }
}

/// A fetched schema description: entities plus the shared typespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescription {
    /// Entities by name.
    pub entities: BTreeMap<String, EntitySchema>,
    /// Shared typespace.
    pub typespace: Typespace,
}

impl SchemaDescription {
    /// Creates an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity.
    #[must_use]
    pub fn with_entity(mut self, name: impl Into<String>, entity: EntitySchema) -> Self {
        self.entities.insert(name.into(), entity);
        self
    }

    /// Sets the typespace.
    #[must_use]
    pub fn with_typespace(mut self, typespace: Typespace) -> Self {
        self.typespace = typespace;
        self
    }

    /// Looks up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// Parses the `expand=true` schema description JSON.
    pub fn from_json(value: &Value) -> DecodeResult<Self> {
        let entities = value
            .get("entities")
            .and_then(Value::as_object)
            .ok_or_else(|| DecodeError::invalid_schema("missing entities object"))?;
        let entities = entities
            .iter()
            .map(|(name, v)| Ok((name.clone(), EntitySchema::from_json(name, v)?)))
            .collect::<DecodeResult<BTreeMap<_, _>>>()?;
        let typespace = match value.get("typespace") {
            Some(ts) => Typespace::from_json(ts)?,
            None => Typespace::default(),
        };
        Ok(Self {
            entities,
            typespace,
        })
    }

    /// Parses the schema description from a JSON string.
    pub fn parse(json: &str) -> DecodeResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| DecodeError::invalid_schema(format!("not JSON: {e}")))?;
        Self::from_json(&value)
    }
}

/// Returns the sole `(key, value)` of a single-entry JSON object.
fn single_entry<'a>(value: &'a Value, what: &str) -> DecodeResult<(&'a str, &'a Value)> {
    let obj: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| DecodeError::invalid_schema(format!("{what} must be an object")))?;
    let mut iter = obj.iter();
    match (iter.next(), iter.next()) {
        (Some((k, v)), None) => Ok((k.as_str(), v)),
        _ => Err(DecodeError::invalid_schema(format!(
            "{what} must have exactly one tag, found {}",
            obj.len()
        ))),
    }
}

fn parse_elements(value: &Value, field: &str) -> DecodeResult<Vec<Element>> {
    let list = value
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| DecodeError::invalid_schema(format!("missing {field} array")))?;
    list.iter().map(Element::from_json).collect()
}
