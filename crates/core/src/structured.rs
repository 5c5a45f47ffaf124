//! Named structured types for numerical and tabular data.
//!
//! Each type decomposes into plain [`Value`]s, so the validator can walk into
//! it the same way it walks into a list.

use serde::{Deserialize, Serialize};

use crate::value::{TypeName, Value};

/// Element type of an [`Array`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Str,
    /// Arbitrary elements. Not on the standard allow-list.
    Object,
}

impl DType {
    pub const ALL: [DType; 14] = [
        DType::Bool,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt8,
        DType::UInt16,
        DType::UInt32,
        DType::Float32,
        DType::Float64,
        DType::Complex64,
        DType::Complex128,
        DType::Str,
        DType::Object,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::Str => "str",
            DType::Object => "object",
        }
    }

    /// Allow-list identifier for this dtype, e.g. `numpy.dtype.float64`.
    pub fn type_name(self) -> TypeName {
        TypeName::new("numpy.dtype", self.name())
    }

    /// Whether `value` can be stored as an element of this dtype.
    pub fn admits(self, value: &Value) -> bool {
        fn int_in(value: &Value, min: i64, max: i64) -> bool {
            matches!(value, Value::Int(v) if (min..=max).contains(v))
        }
        match self {
            DType::Bool => matches!(value, Value::Bool(_)),
            DType::Int8 => int_in(value, i8::MIN.into(), i8::MAX.into()),
            DType::Int16 => int_in(value, i16::MIN.into(), i16::MAX.into()),
            DType::Int32 => int_in(value, i32::MIN.into(), i32::MAX.into()),
            DType::Int64 => matches!(value, Value::Int(_)),
            DType::UInt8 => int_in(value, 0, u8::MAX.into()),
            DType::UInt16 => int_in(value, 0, u16::MAX.into()),
            DType::UInt32 => int_in(value, 0, u32::MAX.into()),
            DType::Float32 | DType::Float64 => matches!(value, Value::Float(_)),
            DType::Complex64 | DType::Complex128 => matches!(value, Value::Complex(_)),
            DType::Str => matches!(value, Value::Str(_)),
            DType::Object => true,
        }
    }
}

/// N-dimensional array stored as a flat row-major element list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Array {
    pub dtype: DType,
    pub shape: Vec<u64>,
    pub items: Vec<Value>,
}

impl Array {
    pub fn new(dtype: DType, shape: Vec<u64>, items: Vec<Value>) -> Self {
        Self {
            dtype,
            shape,
            items,
        }
    }

    /// One-dimensional float64 array.
    pub fn from_f64(data: impl IntoIterator<Item = f64>) -> Self {
        Self::vector(DType::Float64, data.into_iter().map(Value::Float).collect())
    }

    /// One-dimensional int64 array.
    pub fn from_i64(data: impl IntoIterator<Item = i64>) -> Self {
        Self::vector(DType::Int64, data.into_iter().map(Value::Int).collect())
    }

    /// One-dimensional bool array.
    pub fn from_bool(data: impl IntoIterator<Item = bool>) -> Self {
        Self::vector(DType::Bool, data.into_iter().map(Value::Bool).collect())
    }

    /// Reinterprets the elements with a new shape; does not check the product.
    pub fn reshape(mut self, shape: Vec<u64>) -> Self {
        self.shape = shape;
        self
    }

    fn vector(dtype: DType, items: Vec<Value>) -> Self {
        let len = items.len() as u64;
        Self::new(dtype, vec![len], items)
    }

    /// Number of elements the shape describes, or `None` on overflow.
    pub fn shape_len(&self) -> Option<u64> {
        self.shape
            .iter()
            .try_fold(1u64, |acc, dim| acc.checked_mul(*dim))
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One-dimensional labelled sequence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: Option<String>,
    pub index: Vec<Value>,
    pub values: Vec<Value>,
}

impl Series {
    /// Builds a series with a `0..n` integer index.
    pub fn new(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self {
            name: None,
            index: range_index(values.len()),
            values,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_index(mut self, index: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.index = index.into_iter().map(Into::into).collect();
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named column of a [`DataFrame`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Table of equally long named columns sharing one index.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DataFrame {
    pub index: Vec<Value>,
    pub columns: Vec<Column>,
}

impl DataFrame {
    /// Builds a frame whose index is `0..n`, `n` being the first column's length.
    pub fn new<N, I, V>(columns: impl IntoIterator<Item = (N, I)>) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Column {
                name: name.into(),
                values: values.into_iter().map(Into::into).collect(),
            })
            .collect();
        let rows = columns.first().map(|column| column.values.len()).unwrap_or(0);
        Self {
            index: range_index(rows),
            columns,
        }
    }

    pub fn with_index(mut self, index: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.index = index.into_iter().map(Into::into).collect();
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn rows(&self) -> usize {
        self.index.len()
    }
}

/// A value of a type outside the built-in shapes: its qualified type name and
/// the state it is rebuilt from. Persistable only when its type name is
/// registered as [`Capability::Structured`](crate::Capability::Structured).
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub type_name: TypeName,
    pub state: Box<Value>,
}

impl Object {
    pub fn new(type_name: TypeName, state: impl Into<Value>) -> Self {
        Self {
            type_name,
            state: Box::new(state.into()),
        }
    }
}

fn range_index(len: usize) -> Vec<Value> {
    (0..len).map(|i| Value::Int(i as i64)).collect()
}
