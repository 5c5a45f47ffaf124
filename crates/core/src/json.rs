//! Conversions between [`Value`] and JSON.
//!
//! `to_json` is a display form used by tooling: shapes JSON lacks are written
//! as objects tagged with `"$type"`, and it is not meant to be read back.
//! `from_json` maps plain JSON onto values.

use serde_json::{json, Map, Number, Value as Json};

use crate::document::Document;
use crate::value::{TypeName, Value};

impl Value {
    pub fn to_json(&self) -> Json {
        match self {
            Value::None => Json::Null,
            Value::Bool(value) => Json::Bool(*value),
            Value::Int(value) => Json::from(*value),
            Value::Float(value) => float_to_json(*value),
            Value::Complex(value) => json!({
                "$type": TypeName::COMPLEX.as_str(),
                "re": float_to_json(value.re),
                "im": float_to_json(value.im),
            }),
            Value::Str(value) => Json::String(value.clone()),
            Value::Bytes(bytes) => json!({
                "$type": TypeName::BYTES.as_str(),
                "hex": hex(bytes),
            }),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => items_to_json(items),
            Value::Dict(entries) => {
                let string_keys: Option<Map<String, Json>> = entries
                    .iter()
                    .map(|(key, value)| Some((key.as_str()?.to_string(), value.to_json())))
                    .collect();
                match string_keys {
                    Some(map) => Json::Object(map),
                    None => Json::Array(
                        entries
                            .iter()
                            .map(|(key, value)| Json::Array(vec![key.to_json(), value.to_json()]))
                            .collect(),
                    ),
                }
            }
            Value::Array(array) => json!({
                "$type": TypeName::NDARRAY.as_str(),
                "dtype": array.dtype.name(),
                "shape": array.shape,
                "items": items_to_json(&array.items),
            }),
            Value::Series(series) => json!({
                "$type": TypeName::SERIES.as_str(),
                "name": series.name,
                "index": items_to_json(&series.index),
                "values": items_to_json(&series.values),
            }),
            Value::DataFrame(frame) => {
                let columns: Map<String, Json> = frame
                    .columns
                    .iter()
                    .map(|column| (column.name.clone(), items_to_json(&column.values)))
                    .collect();
                json!({
                    "$type": TypeName::DATAFRAME.as_str(),
                    "index": items_to_json(&frame.index),
                    "columns": columns,
                })
            }
            Value::Object(object) => json!({
                "$type": object.type_name.as_str(),
                "state": object.state.to_json(),
            }),
        }
    }

    /// Maps JSON onto values: arrays become lists and objects become dicts
    /// with string keys. Integers outside `i64` become floats.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::None,
            Json::Bool(value) => Value::Bool(*value),
            Json::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(value) => Value::Str(value.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Dict(
                map.iter()
                    .map(|(key, value)| (Value::Str(key.clone()), Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl Document {
    /// Display form of every variable as one JSON object keyed by name.
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.iter()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect(),
        )
    }
}

fn float_to_json(value: f64) -> Json {
    Number::from_f64(value)
        .map(Json::Number)
        .unwrap_or_else(|| Json::String(value.to_string()))
}

fn items_to_json(items: &[Value]) -> Json {
    Json::Array(items.iter().map(Value::to_json).collect())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::{Array, DataFrame};

    #[test]
    fn plain_json_maps_onto_values() {
        let json = json!({"x": 1, "y": [1.5, null, true], "z": "text"});
        let value = Value::from_json(&json);
        assert_eq!(value.get("x"), Some(&Value::Int(1)));
        assert_eq!(
            value.get("y"),
            Some(&Value::List(vec![
                Value::Float(1.5),
                Value::None,
                Value::Bool(true)
            ]))
        );
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn non_json_shapes_are_tagged() {
        let array = Value::from(Array::from_i64([1, 2]));
        assert_eq!(
            array.to_json(),
            json!({"$type": "numpy.ndarray", "dtype": "int64", "shape": [2], "items": [1, 2]})
        );
        assert_eq!(
            Value::bytes(vec![0xde, 0xad]).to_json(),
            json!({"$type": "builtins.bytes", "hex": "dead"})
        );
        assert_eq!(Value::Float(f64::INFINITY).to_json(), json!("inf"));

        let frame = Value::from(DataFrame::new([("a", vec![1])]));
        assert_eq!(frame.to_json()["columns"]["a"], json!([1]));
    }

    #[test]
    fn dicts_with_non_string_keys_become_pairs() {
        let value = Value::dict([(1, "one"), (2, "two")]);
        assert_eq!(value.to_json(), json!([[1, "one"], [2, "two"]]));
    }
}
