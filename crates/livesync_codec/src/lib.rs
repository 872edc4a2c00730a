//! # Livesync Codec
//!
//! Schema-driven decoding of wire values for livesync.
//!
//! The server describes every table column with an algebraic type
//! ([`TypeDescriptor`]). Row values arrive as untyped JSON; this crate turns
//! them into typed [`DomainValue`]s and derives canonical [`RowKey`]s for row
//! identity.
//!
//! ## Decoding Rules
//!
//! - Products decode positionally (arrays) or by field name (objects)
//! - A product with zero fields decodes to `Null`
//! - Sums arrive as `{"<variant index>": value}` and decode to the inner value
//! - 64- and 128-bit integers never pass through floating point
//! - `Ref(i)` resolves through the schema's [`Typespace`]
//! - A product whose only field is `__identity_bytes` / `__address_bytes`
//!   becomes an [`Identity`] / [`Address`]
//!
//! ## Usage
//!
//! ```
//! use livesync_codec::{decode, BuiltinType, DomainValue, TypeDescriptor};
//! use serde_json::json;
//!
//! let ty = TypeDescriptor::product([
//!     ("id", TypeDescriptor::builtin(BuiltinType::U32)),
//!     ("text", TypeDescriptor::builtin(BuiltinType::String)),
//! ]);
//! let row = decode(&ty, &json!([5, "hello"]), None).unwrap();
//! assert_eq!(row.get("text").and_then(DomainValue::as_str), Some("hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod error;
mod key;
mod types;
mod value;

pub use decoder::{decode, decode_row, decode_sum_tagged, SchemaDecoder, TaggedValue};
pub use error::{DecodeError, DecodeResult};
pub use key::RowKey;
pub use types::{
    BuiltinType, Element, EntityKind, EntitySchema, ProductType, SchemaDescription, SumType,
    TypeDescriptor, Typespace, ADDRESS_FIELD, IDENTITY_FIELD,
};
pub use value::{Address, DomainValue, Identity};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_from_parsed_schema() {
        let schema = SchemaDescription::parse(
            r#"{
                "entities": {
                    "Message": {
                        "type": "table",
                        "arity": 2,
                        "schema": {"elements": [
                            {"name": {"some": "id"}, "algebraic_type": {"Builtin": {"U32": []}}},
                            {"name": {"some": "text"}, "algebraic_type": {"Ref": 0}}
                        ]}
                    }
                },
                "typespace": [{"Builtin": {"String": []}}]
            }"#,
        )
        .unwrap();
        let entity = schema.entity("Message").unwrap();

        let row = decode_row(entity, &json!([5, "old"]), Some(&schema.typespace)).unwrap();
        assert_eq!(
            row,
            DomainValue::Product(vec![
                ("id".to_string(), DomainValue::Int(5)),
                ("text".to_string(), DomainValue::from("old")),
            ])
        );
    }

    #[test]
    fn decode_is_deterministic() {
        let ty = TypeDescriptor::array(TypeDescriptor::builtin(BuiltinType::U64));
        let raw = json!(["18446744073709551615", 1, 2]);
        assert_eq!(decode(&ty, &raw, None), decode(&ty, &raw, None));
        assert_eq!(RowKey::from_raw(&raw), RowKey::from_raw(&raw));
    }
}
