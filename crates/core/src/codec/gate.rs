//! Gated reconstruction of values from the postcard payload.
//!
//! Every seed consults the [`GateContext`] before it builds anything: the
//! type named by a tag, an object header or a dtype is admitted as soon as it
//! is read, and each finished node is checked before its parent sees it. A
//! refused node therefore never reaches the caller.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;

use serde::de::{
    DeserializeSeed, Deserializer, EnumAccess, Expected, SeqAccess, VariantAccess, Visitor,
};

use crate::allowlist::Capability;
use crate::engine::Trust;
use crate::structured::{Array, Column, DType, DataFrame, Object, Series};
use crate::validate::{PathSegment, Rejection, StructuralValidator, ValuePath};
use crate::value::{Kind, TypeName, Value};

use super::wire::VALUE;

/// Cap on preallocation driven by length prefixes in untrusted input.
const MAX_PREALLOC: usize = 4096;

/// Why the gate stopped a decode.
#[derive(Debug)]
pub(crate) enum GateFailure {
    Rejected(Rejection),
    TooDeep(usize),
    /// Well-framed bytes that do not describe a value.
    Malformed(String),
}

pub(crate) struct GateContext<'a> {
    validator: StructuralValidator<'a>,
    trust: Trust,
    depth: Cell<usize>,
    path: RefCell<ValuePath>,
    failure: RefCell<Option<GateFailure>>,
    warned: RefCell<BTreeSet<TypeName>>,
}

impl<'a> GateContext<'a> {
    pub(crate) fn new(validator: StructuralValidator<'a>, trust: Trust) -> Self {
        Self {
            validator,
            trust,
            depth: Cell::new(0),
            path: RefCell::new(ValuePath::default()),
            failure: RefCell::new(None),
            warned: RefCell::new(BTreeSet::new()),
        }
    }

    /// The failure recorded by the gate, if the decode stopped because of it.
    pub(crate) fn take_failure(&self) -> Option<GateFailure> {
        self.failure.borrow_mut().take()
    }

    fn fail<E: serde::de::Error>(&self, failure: GateFailure) -> E {
        let message = match &failure {
            GateFailure::Rejected(rejection) => rejection.to_string(),
            GateFailure::TooDeep(limit) => format!("nesting exceeds {limit} levels"),
            GateFailure::Malformed(message) => message.clone(),
        };
        *self.failure.borrow_mut() = Some(failure);
        E::custom(message)
    }

    /// Records `problem` with the current path; postcard drops custom messages.
    fn malformed<E: serde::de::Error>(&self, problem: String) -> E {
        let path = self.path.borrow().to_string();
        self.fail(GateFailure::Malformed(format!("{problem} at `{path}`")))
    }

    fn admit<E: serde::de::Error>(&self, type_name: &TypeName, used: Capability) -> Result<(), E> {
        match self.trust {
            Trust::Gated => {
                let path = self.path.borrow();
                self.validator
                    .admit(type_name, used, &path)
                    .map_err(|rejection| self.fail(GateFailure::Rejected(rejection)))
            }
            Trust::Trusted => {
                if self.validator.allow_list().lookup(type_name) != Some(used)
                    && self.warned.borrow_mut().insert(type_name.clone())
                {
                    tracing::warn!(
                        type_name = %type_name,
                        "trusted load is rebuilding a type outside the allow-list"
                    );
                }
                Ok(())
            }
        }
    }

    fn check_node<E: serde::de::Error>(&self, value: &Value) -> Result<(), E> {
        match self.trust {
            Trust::Gated => {
                let path = self.path.borrow();
                self.validator
                    .check_node(value, &path)
                    .map_err(|rejection| self.fail(GateFailure::Rejected(rejection)))
            }
            Trust::Trusted => Ok(()),
        }
    }

    fn with_segment<T>(&self, segment: PathSegment, f: impl FnOnce() -> T) -> T {
        self.path.borrow_mut().push(segment);
        let out = f();
        self.path.borrow_mut().pop();
        out
    }

    fn with_root<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        *self.path.borrow_mut() = ValuePath::root(name);
        let out = f();
        *self.path.borrow_mut() = ValuePath::default();
        out
    }
}

fn missing<E: serde::de::Error>(ctx: &GateContext<'_>, field: usize, what: &dyn Expected) -> E {
    ctx.malformed(format!("{what} ends before field {field}"))
}

fn capacity(hint: Option<usize>) -> usize {
    hint.unwrap_or(0).min(MAX_PREALLOC)
}

/// Reads the top-level `(name, value)` sequence.
pub(crate) struct DocumentSeed<'c, 'a> {
    pub(crate) ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_, '_> {
    type Value = Vec<(String, Value)>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_, '_> {
    type Value = Vec<(String, Value)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of named values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(capacity(seq.size_hint()));
        while let Some(entry) = seq.next_element_seed(EntrySeed { ctx: self.ctx })? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

struct EntrySeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for EntrySeed<'_, '_> {
    type Value = (String, Value);

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_tuple(2, self)
    }
}

impl<'de> Visitor<'de> for EntrySeed<'_, '_> {
    type Value = (String, Value);

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a name and its value")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let name: String = seq
            .next_element()?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 0, &self))?;
        let ctx = self.ctx;
        let value = ctx
            .with_root(&name, || seq.next_element_seed(ValueSeed { ctx }))?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 1, &self))?;
        Ok((name, value))
    }
}

/// Reads one [`Value`], enforcing the depth limit around it.
pub(crate) struct ValueSeed<'c, 'a> {
    pub(crate) ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_, '_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        let ctx = self.ctx;
        let depth = ctx.depth.get();
        let limit = ctx.validator.max_depth();
        if depth > limit {
            return Err(ctx.fail(GateFailure::TooDeep(limit)));
        }
        ctx.depth.set(depth + 1);
        let result = deserializer.deserialize_enum(VALUE, Kind::NAMES, ValueVisitor { ctx });
        ctx.depth.set(depth);
        result
    }
}

struct ValueVisitor<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> Visitor<'de> for ValueVisitor<'_, '_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tagged value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Value, A::Error> {
        let ctx = self.ctx;
        let (tag, variant) = data.variant::<u32>()?;
        let kind = Kind::from_tag(tag)
            .ok_or_else(|| ctx.malformed::<A::Error>(format!("unknown value tag {tag}")))?;
        if let Some((type_name, capability)) = kind.requirement() {
            ctx.admit::<A::Error>(&type_name, capability)?;
        }
        let value = match kind {
            Kind::None => {
                variant.unit_variant()?;
                Value::None
            }
            Kind::Bool => Value::Bool(variant.newtype_variant()?),
            Kind::Int => Value::Int(variant.newtype_variant()?),
            Kind::Float => Value::Float(variant.newtype_variant()?),
            Kind::Complex => Value::Complex(variant.newtype_variant()?),
            Kind::Str => Value::Str(variant.newtype_variant()?),
            Kind::Bytes => Value::Bytes(variant.newtype_variant_seed(BytesSeed)?),
            Kind::List => Value::List(variant.newtype_variant_seed(ItemsSeed::indexed(ctx))?),
            Kind::Tuple => Value::Tuple(variant.newtype_variant_seed(ItemsSeed::indexed(ctx))?),
            Kind::Set => Value::Set(variant.newtype_variant_seed(ItemsSeed::indexed(ctx))?),
            Kind::Dict => Value::Dict(variant.newtype_variant_seed(EntriesSeed { ctx })?),
            Kind::Array => Value::Array(variant.newtype_variant_seed(ArraySeed { ctx })?),
            Kind::Series => Value::Series(variant.newtype_variant_seed(SeriesSeed { ctx })?),
            Kind::DataFrame => {
                Value::DataFrame(variant.newtype_variant_seed(DataFrameSeed { ctx })?)
            }
            Kind::Object => variant.tuple_variant(2, ObjectVisitor { ctx })?,
        };
        ctx.check_node::<A::Error>(&value)?;
        Ok(value)
    }
}

struct BytesSeed;

impl<'de> DeserializeSeed<'de> for BytesSeed {
    type Value = Vec<u8>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_byte_buf(self)
    }
}

impl<'de> Visitor<'de> for BytesSeed {
    type Value = Vec<u8>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: serde::de::Error>(self, bytes: &[u8]) -> Result<Vec<u8>, E> {
        Ok(bytes.to_vec())
    }

    fn visit_byte_buf<E: serde::de::Error>(self, bytes: Vec<u8>) -> Result<Vec<u8>, E> {
        Ok(bytes)
    }
}

/// Reads a sequence of values, naming each child with `segment(position)`.
struct ItemsSeed<'c, 'a, F> {
    ctx: &'c GateContext<'a>,
    segment: F,
}

impl<'c, 'a> ItemsSeed<'c, 'a, fn(usize) -> PathSegment> {
    fn indexed(ctx: &'c GateContext<'a>) -> Self {
        Self {
            ctx,
            segment: PathSegment::Index,
        }
    }

    fn labels(ctx: &'c GateContext<'a>) -> Self {
        Self {
            ctx,
            segment: PathSegment::IndexLabel,
        }
    }
}

impl<'de, F: Fn(usize) -> PathSegment> DeserializeSeed<'de> for ItemsSeed<'_, '_, F> {
    type Value = Vec<Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<Value>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F: Fn(usize) -> PathSegment> Visitor<'de> for ItemsSeed<'_, '_, F> {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Value>, A::Error> {
        let ctx = self.ctx;
        let mut items = Vec::with_capacity(capacity(seq.size_hint()));
        loop {
            let segment = (self.segment)(items.len());
            match ctx.with_segment(segment, || seq.next_element_seed(ValueSeed { ctx }))? {
                Some(item) => items.push(item),
                None => return Ok(items),
            }
        }
    }
}

struct EntriesSeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for EntriesSeed<'_, '_> {
    type Value = Vec<(Value, Value)>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for EntriesSeed<'_, '_> {
    type Value = Vec<(Value, Value)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of key/value pairs")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(capacity(seq.size_hint()));
        while let Some(entry) = seq.next_element_seed(PairSeed {
            ctx: self.ctx,
            position: entries.len(),
        })? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

struct PairSeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
    position: usize,
}

impl<'de> DeserializeSeed<'de> for PairSeed<'_, '_> {
    type Value = (Value, Value);

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_tuple(2, self)
    }
}

impl<'de> Visitor<'de> for PairSeed<'_, '_> {
    type Value = (Value, Value);

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a key/value pair")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let ctx = self.ctx;
        let key = ctx
            .with_segment(PathSegment::KeyAt(self.position), || {
                seq.next_element_seed(ValueSeed { ctx })
            })?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 0, &self))?;
        let value = ctx
            .with_segment(PathSegment::Key(key.key_label()), || {
                seq.next_element_seed(ValueSeed { ctx })
            })?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 1, &self))?;
        Ok((key, value))
    }
}

struct ArraySeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for ArraySeed<'_, '_> {
    type Value = Array;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Array, D::Error> {
        deserializer.deserialize_struct("Array", &["dtype", "shape", "items"], self)
    }
}

impl<'de> Visitor<'de> for ArraySeed<'_, '_> {
    type Value = Array;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Array, A::Error> {
        let ctx = self.ctx;
        let dtype: DType = seq
            .next_element()
            .map_err(|err| ctx.malformed::<A::Error>(format!("unreadable dtype ({err})")))?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 0, &self))?;
        ctx.admit::<A::Error>(&dtype.type_name(), Capability::Element)?;
        let shape: Vec<u64> = seq
            .next_element()?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 1, &self))?;
        let items = seq
            .next_element_seed(ItemsSeed::indexed(ctx))?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 2, &self))?;
        Ok(Array::new(dtype, shape, items))
    }
}

struct SeriesSeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for SeriesSeed<'_, '_> {
    type Value = Series;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Series, D::Error> {
        deserializer.deserialize_struct("Series", &["name", "index", "values"], self)
    }
}

impl<'de> Visitor<'de> for SeriesSeed<'_, '_> {
    type Value = Series;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a series")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Series, A::Error> {
        let ctx = self.ctx;
        let name: Option<String> = seq
            .next_element()?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 0, &self))?;
        let index = seq
            .next_element_seed(ItemsSeed::labels(ctx))?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 1, &self))?;
        let values = seq
            .next_element_seed(ItemsSeed::indexed(ctx))?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 2, &self))?;
        Ok(Series {
            name,
            index,
            values,
        })
    }
}

struct DataFrameSeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for DataFrameSeed<'_, '_> {
    type Value = DataFrame;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<DataFrame, D::Error> {
        deserializer.deserialize_struct("DataFrame", &["index", "columns"], self)
    }
}

impl<'de> Visitor<'de> for DataFrameSeed<'_, '_> {
    type Value = DataFrame;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a data frame")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<DataFrame, A::Error> {
        let ctx = self.ctx;
        let index = seq
            .next_element_seed(ItemsSeed::labels(ctx))?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 0, &self))?;
        let columns = seq
            .next_element_seed(ColumnsSeed { ctx })?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 1, &self))?;
        Ok(DataFrame { index, columns })
    }
}

struct ColumnsSeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for ColumnsSeed<'_, '_> {
    type Value = Vec<Column>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<Column>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ColumnsSeed<'_, '_> {
    type Value = Vec<Column>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of columns")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Column>, A::Error> {
        let mut columns = Vec::with_capacity(capacity(seq.size_hint()));
        while let Some(column) = seq.next_element_seed(ColumnSeed { ctx: self.ctx })? {
            columns.push(column);
        }
        Ok(columns)
    }
}

struct ColumnSeed<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> DeserializeSeed<'de> for ColumnSeed<'_, '_> {
    type Value = Column;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Column, D::Error> {
        deserializer.deserialize_struct("Column", &["name", "values"], self)
    }
}

impl<'de> Visitor<'de> for ColumnSeed<'_, '_> {
    type Value = Column;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a named column")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Column, A::Error> {
        let name: String = seq
            .next_element()?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 0, &self))?;
        let cells = ItemsSeed {
            ctx: self.ctx,
            segment: |row| PathSegment::Cell(name.clone(), row),
        };
        let values = seq
            .next_element_seed(cells)?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 1, &self))?;
        Ok(Column { name, values })
    }
}

/// Reads an object's type name, admits it, then reads its state.
struct ObjectVisitor<'c, 'a> {
    ctx: &'c GateContext<'a>,
}

impl<'de> Visitor<'de> for ObjectVisitor<'_, '_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a type name and its state")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let ctx = self.ctx;
        let raw: String = seq
            .next_element()?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 0, &self))?;
        let type_name = TypeName::parse(&raw).ok_or_else(|| {
            ctx.malformed::<A::Error>(format!("`{raw}` is not a qualified type name"))
        })?;
        ctx.admit::<A::Error>(&type_name, Capability::Structured)?;
        let state = ctx
            .with_segment(PathSegment::Field("state"), || {
                seq.next_element_seed(ValueSeed { ctx })
            })?
            .ok_or_else(|| missing::<A::Error>(self.ctx, 1, &self))?;
        Ok(Value::Object(Object::new(type_name, state)))
    }
}
