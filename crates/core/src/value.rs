//! The value tree that documents are made of.
//!
//! Every persisted value is a [`Value`]. Primitives are always persistable;
//! every other shape carries a [`TypeName`] that must be on the active
//! [`TypeAllowList`](crate::TypeAllowList) before it is written or rebuilt.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::allowlist::Capability;
use crate::structured::{Array, DataFrame, Object, Series};
use crate::validate::PathSegment;

/// Qualified type identifier, written `module.name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Cow<'static, str>);

impl TypeName {
    pub const NONE: TypeName = TypeName::from_static("builtins.NoneType");
    pub const BOOL: TypeName = TypeName::from_static("builtins.bool");
    pub const INT: TypeName = TypeName::from_static("builtins.int");
    pub const FLOAT: TypeName = TypeName::from_static("builtins.float");
    pub const COMPLEX: TypeName = TypeName::from_static("builtins.complex");
    pub const STR: TypeName = TypeName::from_static("builtins.str");
    pub const BYTES: TypeName = TypeName::from_static("builtins.bytes");
    pub const LIST: TypeName = TypeName::from_static("builtins.list");
    pub const TUPLE: TypeName = TypeName::from_static("builtins.tuple");
    pub const SET: TypeName = TypeName::from_static("builtins.set");
    pub const DICT: TypeName = TypeName::from_static("builtins.dict");
    pub const NDARRAY: TypeName = TypeName::from_static("numpy.ndarray");
    pub const SERIES: TypeName = TypeName::from_static("pandas.Series");
    pub const DATAFRAME: TypeName = TypeName::from_static("pandas.DataFrame");

    /// Wraps a qualified name known at compile time.
    pub const fn from_static(qualified: &'static str) -> Self {
        Self(Cow::Borrowed(qualified))
    }

    /// Joins a module path and a type name.
    pub fn new(module: &str, name: &str) -> Self {
        Self(Cow::Owned(format!("{module}.{name}")))
    }

    /// Parses `module.name`, rejecting empty parts and whitespace.
    pub fn parse(qualified: &str) -> Option<Self> {
        well_formed(qualified).then(|| Self(Cow::Owned(qualified.to_string())))
    }

    /// Whether [`parse`](Self::parse) would accept this name. Names built
    /// with `new` or `from_static` are not checked until they are saved.
    pub fn is_well_formed(&self) -> bool {
        well_formed(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn module(&self) -> &str {
        self.0.rsplit_once('.').map(|(module, _)| module).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.0
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.0)
    }
}

fn well_formed(qualified: &str) -> bool {
    let Some((module, name)) = qualified.rsplit_once('.') else {
        return false;
    };
    let part = |part: &str| {
        !part.is_empty() && !part.chars().any(|c| c.is_whitespace() || c.is_control())
    };
    part(name) && module.split('.').all(part)
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complex number with `f64` parts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// A persistable value tree.
///
/// `Dict` keeps insertion order and `Set` keeps the order elements were
/// given in; uniqueness of keys and elements is checked by the validator,
/// not at construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Array(Array),
    Series(Series),
    DataFrame(DataFrame),
    Object(Object),
}

/// Shape classification of a value. The discriminant doubles as the wire tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum Kind {
    None = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    Complex = 4,
    Str = 5,
    Bytes = 6,
    List = 7,
    Tuple = 8,
    Set = 9,
    Dict = 10,
    Array = 11,
    Series = 12,
    DataFrame = 13,
    Object = 14,
}

impl Kind {
    pub(crate) const NAMES: &'static [&'static str] = &[
        "None",
        "Bool",
        "Int",
        "Float",
        "Complex",
        "Str",
        "Bytes",
        "List",
        "Tuple",
        "Set",
        "Dict",
        "Array",
        "Series",
        "DataFrame",
        "Object",
    ];

    pub(crate) fn of(value: &Value) -> Self {
        match value {
            Value::None => Kind::None,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Complex(_) => Kind::Complex,
            Value::Str(_) => Kind::Str,
            Value::Bytes(_) => Kind::Bytes,
            Value::List(_) => Kind::List,
            Value::Tuple(_) => Kind::Tuple,
            Value::Set(_) => Kind::Set,
            Value::Dict(_) => Kind::Dict,
            Value::Array(_) => Kind::Array,
            Value::Series(_) => Kind::Series,
            Value::DataFrame(_) => Kind::DataFrame,
            Value::Object(_) => Kind::Object,
        }
    }

    pub(crate) fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Kind::None,
            1 => Kind::Bool,
            2 => Kind::Int,
            3 => Kind::Float,
            4 => Kind::Complex,
            5 => Kind::Str,
            6 => Kind::Bytes,
            7 => Kind::List,
            8 => Kind::Tuple,
            9 => Kind::Set,
            10 => Kind::Dict,
            11 => Kind::Array,
            12 => Kind::Series,
            13 => Kind::DataFrame,
            14 => Kind::Object,
            _ => return None,
        })
    }

    pub(crate) fn tag(self) -> u32 {
        self as u32
    }

    pub(crate) fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    /// Type name and capability the allow-list must grant, or `None` for
    /// primitives and for objects, whose name is only known per instance.
    pub(crate) fn requirement(self) -> Option<(TypeName, Capability)> {
        let requirement = match self {
            Kind::None | Kind::Bool | Kind::Int | Kind::Float | Kind::Str | Kind::Bytes => {
                return None
            }
            Kind::Object => return None,
            Kind::Complex => (TypeName::COMPLEX, Capability::Scalar),
            Kind::List => (TypeName::LIST, Capability::Sequence),
            Kind::Tuple => (TypeName::TUPLE, Capability::Sequence),
            Kind::Set => (TypeName::SET, Capability::Sequence),
            Kind::Dict => (TypeName::DICT, Capability::Mapping),
            Kind::Array => (TypeName::NDARRAY, Capability::Structured),
            Kind::Series => (TypeName::SERIES, Capability::Structured),
            Kind::DataFrame => (TypeName::DATAFRAME, Capability::Structured),
        };
        Some(requirement)
    }
}

/// Borrowed, hashable projection of a value used as a dict key or set element.
#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) enum HashKey<'a> {
    None,
    Bool(bool),
    Int(i64),
    Float(u64),
    Complex(u64, u64),
    Str(&'a str),
    Bytes(&'a [u8]),
    Tuple(Vec<HashKey<'a>>),
}

/// Float bits with `-0.0` folded into `0.0` and every NaN into one pattern,
/// so keys that compare equal hash equal.
fn float_key(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

impl Value {
    /// Builds a byte-string value.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    /// Builds a dict from key/value pairs, keeping their order.
    pub fn dict<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Builds a tuple from its elements.
    pub fn tuple(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Builds a set; element order is preserved as given.
    pub fn set(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    pub(crate) fn kind(&self) -> Kind {
        Kind::of(self)
    }

    /// Short name of the value's shape, used in messages.
    pub fn kind_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Returns the type identifier the allow-list is consulted with.
    pub fn type_name(&self) -> TypeName {
        match self {
            Value::None => TypeName::NONE,
            Value::Bool(_) => TypeName::BOOL,
            Value::Int(_) => TypeName::INT,
            Value::Float(_) => TypeName::FLOAT,
            Value::Str(_) => TypeName::STR,
            Value::Bytes(_) => TypeName::BYTES,
            Value::Object(object) => object.type_name.clone(),
            other => other
                .kind()
                .requirement()
                .map(|(type_name, _)| type_name)
                .unwrap_or(TypeName::NONE),
        }
    }

    /// Capability this value needs from the allow-list; `None` for primitives.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Value::Object(_) => Some(Capability::Structured),
            other => other.kind().requirement().map(|(_, capability)| capability),
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.capability().is_none()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Elements of a list, tuple or set.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a string key in a dict.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?
            .iter()
            .find(|(candidate, _)| candidate.as_str() == Some(key))
            .map(|(_, value)| value)
    }

    pub(crate) fn hash_key(&self) -> Option<HashKey<'_>> {
        Some(match self {
            Value::None => HashKey::None,
            Value::Bool(value) => HashKey::Bool(*value),
            Value::Int(value) => HashKey::Int(*value),
            Value::Float(value) => HashKey::Float(float_key(*value)),
            Value::Complex(value) => HashKey::Complex(float_key(value.re), float_key(value.im)),
            Value::Str(value) => HashKey::Str(value),
            Value::Bytes(value) => HashKey::Bytes(value),
            Value::Tuple(items) => HashKey::Tuple(
                items
                    .iter()
                    .map(Value::hash_key)
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        })
    }

    /// Rendering of a key for error paths, e.g. `"name"` or `3`.
    pub(crate) fn key_label(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Str(value) => format!("{value:?}"),
            Value::Bytes(value) => format!("b{:?}", String::from_utf8_lossy(value)),
            Value::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(Value::key_label).collect();
                format!("({})", inner.join(", "))
            }
            other => format!("<{}>", other.kind_name()),
        }
    }

    /// Visits direct children with the path segment that leads to each.
    pub(crate) fn for_each_child<E>(
        &self,
        mut visit: impl FnMut(PathSegment, &Value) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Value::None
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Complex(_)
            | Value::Str(_)
            | Value::Bytes(_) => Ok(()),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                for (index, item) in items.iter().enumerate() {
                    visit(PathSegment::Index(index), item)?;
                }
                Ok(())
            }
            Value::Dict(entries) => {
                for (index, (key, value)) in entries.iter().enumerate() {
                    visit(PathSegment::KeyAt(index), key)?;
                    visit(PathSegment::Key(key.key_label()), value)?;
                }
                Ok(())
            }
            Value::Array(array) => {
                for (index, item) in array.items.iter().enumerate() {
                    visit(PathSegment::Index(index), item)?;
                }
                Ok(())
            }
            Value::Series(series) => {
                for (index, label) in series.index.iter().enumerate() {
                    visit(PathSegment::IndexLabel(index), label)?;
                }
                for (index, item) in series.values.iter().enumerate() {
                    visit(PathSegment::Index(index), item)?;
                }
                Ok(())
            }
            Value::DataFrame(frame) => {
                for (index, label) in frame.index.iter().enumerate() {
                    visit(PathSegment::IndexLabel(index), label)?;
                }
                for column in &frame.columns {
                    for (index, item) in column.values.iter().enumerate() {
                        visit(PathSegment::Cell(column.name.clone(), index), item)?;
                    }
                }
                Ok(())
            }
            Value::Object(object) => visit(PathSegment::Field("state"), &object.state),
        }
    }
}

/// Converts a borrowed value into an owned [`Value`]; used by the saving macros
/// so that saving does not consume the caller's variables.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl<T> ToValue for T
where
    T: Clone + Into<Value>,
{
    fn to_value(&self) -> Value {
        self.clone().into()
    }
}

macro_rules! from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Int(i64::from(value))
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Complex> for Value {
    fn from(value: Complex) -> Self {
        Value::Complex(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Value::Array(value)
    }
}

impl From<Series> for Value {
    fn from(value: Series) -> Self {
        Value::Series(value)
    }
}

impl From<DataFrame> for Value {
    fn from(value: DataFrame) -> Self {
        Value::DataFrame(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::None)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Value>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(value: BTreeMap<K, V>) -> Self {
        Value::dict(value)
    }
}

impl<K: Into<Value>, V: Into<Value>, S> From<HashMap<K, V, S>> for Value {
    fn from(value: HashMap<K, V, S>) -> Self {
        Value::dict(value)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_parse_rejects_malformed_names() {
        assert_eq!(
            TypeName::parse("app.models.Point"),
            Some(TypeName::new("app.models", "Point"))
        );
        assert!(TypeName::parse("Point").is_none());
        assert!(TypeName::parse("app..Point").is_none());
        assert!(TypeName::parse("app.").is_none());
        assert!(TypeName::parse("app.Po int").is_none());
    }

    #[test]
    fn type_name_splits_module_and_name() {
        let name = TypeName::new("app.models", "Point");
        assert_eq!(name.module(), "app.models");
        assert_eq!(name.name(), "Point");
        assert_eq!(name.to_string(), "app.models.Point");
    }

    #[test]
    fn wire_tags_match_kind_names() {
        for (tag, name) in Kind::NAMES.iter().enumerate() {
            let kind = Kind::from_tag(tag as u32).expect("every name has a tag");
            assert_eq!(kind.name(), *name);
            assert_eq!(kind.tag(), tag as u32);
        }
        assert!(Kind::from_tag(Kind::NAMES.len() as u32).is_none());
    }

    #[test]
    fn hash_keys_cover_nested_tuples_only() {
        let key = Value::tuple([Value::Int(1), Value::from("a")]);
        assert!(key.hash_key().is_some());
        assert!(Value::Float(1.0).hash_key().is_none());
        assert!(Value::tuple([Value::List(vec![])]).hash_key().is_none());
    }

    #[test]
    fn conversions_build_expected_shapes() {
        assert_eq!(Value::from(vec![1, 2]), Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(Value::from(None::<i32>), Value::None);
        let dict = Value::from(BTreeMap::from([("a", 1.5)]));
        assert_eq!(dict.get("a"), Some(&Value::Float(1.5)));
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
    }
}
