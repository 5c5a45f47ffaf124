//! Serialization of values into the postcard payload.
//!
//! `Value` is written as an enum whose variant index is its
//! [`Kind`](crate::value::Kind) tag; the gated reader in `gate.rs` mirrors
//! this layout field for field.

use serde::ser::{SerializeTupleVariant, Serializer};
use serde::Serialize;

use crate::value::Value;

pub(crate) const VALUE: &str = "Value";

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.kind();
        let (tag, name) = (kind.tag(), kind.name());
        match self {
            Value::None => serializer.serialize_unit_variant(VALUE, tag, name),
            Value::Bool(value) => serializer.serialize_newtype_variant(VALUE, tag, name, value),
            Value::Int(value) => serializer.serialize_newtype_variant(VALUE, tag, name, value),
            Value::Float(value) => serializer.serialize_newtype_variant(VALUE, tag, name, value),
            Value::Complex(value) => serializer.serialize_newtype_variant(VALUE, tag, name, value),
            Value::Str(value) => serializer.serialize_newtype_variant(VALUE, tag, name, value),
            Value::Bytes(value) => {
                serializer.serialize_newtype_variant(VALUE, tag, name, &Bytes(value))
            }
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                serializer.serialize_newtype_variant(VALUE, tag, name, items)
            }
            Value::Dict(entries) => serializer.serialize_newtype_variant(VALUE, tag, name, entries),
            Value::Array(array) => serializer.serialize_newtype_variant(VALUE, tag, name, array),
            Value::Series(series) => serializer.serialize_newtype_variant(VALUE, tag, name, series),
            Value::DataFrame(frame) => {
                serializer.serialize_newtype_variant(VALUE, tag, name, frame)
            }
            Value::Object(object) => {
                let mut fields = serializer.serialize_tuple_variant(VALUE, tag, name, 2)?;
                fields.serialize_field(object.type_name.as_str())?;
                fields.serialize_field(object.state.as_ref())?;
                fields.end()
            }
        }
    }
}

struct Bytes<'a>(&'a [u8]);

impl Serialize for Bytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

/// Top-level payload: the document's `(name, value)` pairs in order.
pub(crate) struct Entries<'a>(pub(crate) &'a [(String, Value)]);

impl Serialize for Entries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|(name, value)| (name.as_str(), value)))
    }
}
