//! Structural validation of value trees against a [`TypeAllowList`].
//!
//! [`StructuralValidator::validate`] walks a whole tree at save time. The
//! decoder calls [`StructuralValidator::admit`] and
//! [`StructuralValidator::check_node`] on each node it rebuilds, so both
//! directions apply the same rules.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::allowlist::{Capability, TypeAllowList};
use crate::resource::ResourceLimiter;
use crate::value::{TypeName, Value};

/// One step from a value to one of its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// Top-level variable name.
    Name(String),
    /// Element of a list, tuple, set, array or series.
    Index(usize),
    /// Value stored under a dict key (rendered key label).
    Key(String),
    /// The key itself at the given entry position.
    KeyAt(usize),
    /// Label of a series or frame index.
    IndexLabel(usize),
    /// Row of a named frame column.
    Cell(String, usize),
    /// Named component of a structured value.
    Field(&'static str),
}

/// Location of a node inside a document, e.g. `frame["price"][3]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValuePath(Vec<PathSegment>);

impl ValuePath {
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![PathSegment::Name(name.into())])
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }

    pub(crate) fn child(&self, segment: PathSegment) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !matches!(self.0.first(), Some(PathSegment::Name(_))) {
            f.write_str("<value>")?;
        }
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Name(name) if position == 0 => write!(f, "{name}")?,
                PathSegment::Name(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(label) => write!(f, "[{label}]")?,
                PathSegment::KeyAt(index) => write!(f, ".<key {index}>")?,
                PathSegment::IndexLabel(index) => write!(f, ".index[{index}]")?,
                PathSegment::Cell(column, row) => write!(f, "[{column:?}][{row}]")?,
                PathSegment::Field(field) => write!(f, ".{field}")?,
            }
        }
        Ok(())
    }
}

/// Why a node was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("type is not on the allow-list")]
    NotAllowed,
    #[error("type name is not of the form `module.name`")]
    MalformedTypeName,
    #[error("allow-list registers it as {registered:?} but it is used as {used:?}")]
    CapabilityMismatch {
        registered: Capability,
        used: Capability,
    },
    #[error("{0} values cannot be used as keys")]
    Unhashable(&'static str),
    #[error("duplicate key {0}")]
    DuplicateKey(String),
    #[error("shape {shape:?} does not describe {found} elements")]
    ShapeMismatch { shape: Vec<u64>, found: usize },
    #[error("{found} element does not fit dtype {dtype}")]
    DTypeMismatch {
        dtype: &'static str,
        found: &'static str,
    },
    #[error("{field} has {found} entries but the index has {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate column {0:?}")]
    DuplicateColumn(String),
    #[error("nesting exceeds the depth limit of {0}")]
    TooDeep(usize),
}

/// A refused node: where it is, what type it has, and why.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cannot persist `{path}` of type `{type_name}`: {reason}")]
pub struct Rejection {
    pub path: ValuePath,
    pub type_name: TypeName,
    pub reason: RejectReason,
}

impl Rejection {
    fn new(path: ValuePath, type_name: TypeName, reason: RejectReason) -> Self {
        Self {
            path,
            type_name,
            reason,
        }
    }
}

/// Classifies value trees as persistable or not.
#[derive(Clone, Copy, Debug)]
pub struct StructuralValidator<'a> {
    allow_list: &'a TypeAllowList,
    max_depth: usize,
}

impl StructuralValidator<'static> {
    /// Validator over the standard allow-list with default limits.
    pub fn standard() -> Self {
        StructuralValidator::new(TypeAllowList::standard(), &ResourceLimiter::default())
    }
}

impl<'a> StructuralValidator<'a> {
    pub fn new(allow_list: &'a TypeAllowList, limits: &ResourceLimiter) -> Self {
        Self {
            allow_list,
            max_depth: limits.max_depth,
        }
    }

    pub fn allow_list(&self) -> &'a TypeAllowList {
        self.allow_list
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Validates a value; rejection paths start at the value itself.
    pub fn validate(&self, value: &Value) -> Result<(), Rejection> {
        let mut path = ValuePath::default();
        self.walk(value, &mut path, 0)
    }

    /// Validates a top-level variable; rejection paths start with `name`.
    pub fn validate_named(&self, name: &str, value: &Value) -> Result<(), Rejection> {
        let mut path = ValuePath::root(name);
        self.walk(value, &mut path, 0)
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    fn walk(&self, value: &Value, path: &mut ValuePath, depth: usize) -> Result<(), Rejection> {
        if depth > self.max_depth {
            return Err(Rejection::new(
                path.clone(),
                value.type_name(),
                RejectReason::TooDeep(self.max_depth),
            ));
        }
        self.check_node(value, path)?;
        value.for_each_child(|segment, child| {
            path.push(segment);
            let result = self.walk(child, path, depth + 1);
            path.pop();
            result
        })
    }

    /// Requires `type_name` to be allow-listed with exactly `used` capability.
    pub fn admit(
        &self,
        type_name: &TypeName,
        used: Capability,
        path: &ValuePath,
    ) -> Result<(), Rejection> {
        if !type_name.is_well_formed() {
            return Err(Rejection::new(
                path.clone(),
                type_name.clone(),
                RejectReason::MalformedTypeName,
            ));
        }
        match self.allow_list.lookup(type_name) {
            Some(registered) if registered == used => Ok(()),
            Some(registered) => Err(Rejection::new(
                path.clone(),
                type_name.clone(),
                RejectReason::CapabilityMismatch { registered, used },
            )),
            None => Err(Rejection::new(
                path.clone(),
                type_name.clone(),
                RejectReason::NotAllowed,
            )),
        }
    }

    /// Checks one node without descending: its type must be admitted and its
    /// own invariants (unique hashable keys, array shape and dtype, table
    /// lengths) must hold. Children are left to the caller.
    pub fn check_node(&self, value: &Value, path: &ValuePath) -> Result<(), Rejection> {
        let Some(used) = value.capability() else {
            return Ok(());
        };
        let type_name = value.type_name();
        self.admit(&type_name, used, path)?;
        match value {
            Value::Set(items) => check_keys(
                items.iter().enumerate().map(|(i, item)| (PathSegment::Index(i), item)),
                path,
            ),
            Value::Dict(entries) => check_keys(
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, (key, _))| (PathSegment::KeyAt(i), key)),
                path,
            ),
            Value::Array(array) => {
                self.admit(&array.dtype.type_name(), Capability::Element, path)?;
                if array.shape_len() != Some(array.items.len() as u64) {
                    return Err(Rejection::new(
                        path.clone(),
                        type_name,
                        RejectReason::ShapeMismatch {
                            shape: array.shape.clone(),
                            found: array.items.len(),
                        },
                    ));
                }
                match array
                    .items
                    .iter()
                    .position(|item| !array.dtype.admits(item))
                {
                    Some(index) => {
                        let item = &array.items[index];
                        Err(Rejection::new(
                            path.child(PathSegment::Index(index)),
                            item.type_name(),
                            RejectReason::DTypeMismatch {
                                dtype: array.dtype.name(),
                                found: item.kind_name(),
                            },
                        ))
                    }
                    None => Ok(()),
                }
            }
            Value::Series(series) => {
                check_labels(&series.index, path)?;
                check_length(
                    "values",
                    series.index.len(),
                    series.values.len(),
                    path,
                    &type_name,
                )
            }
            Value::DataFrame(frame) => {
                check_labels(&frame.index, path)?;
                let mut seen = HashSet::new();
                for column in &frame.columns {
                    if !seen.insert(column.name.as_str()) {
                        return Err(Rejection::new(
                            path.clone(),
                            type_name,
                            RejectReason::DuplicateColumn(column.name.clone()),
                        ));
                    }
                    check_length(
                        &format!("column {:?}", column.name),
                        frame.index.len(),
                        column.values.len(),
                        path,
                        &type_name,
                    )?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Keys must be hashable and pairwise distinct.
fn check_keys<'v>(
    keys: impl Iterator<Item = (PathSegment, &'v Value)>,
    path: &ValuePath,
) -> Result<(), Rejection> {
    let mut seen = HashSet::new();
    for (segment, key) in keys {
        let Some(hash_key) = key.hash_key() else {
            return Err(Rejection::new(
                path.child(segment),
                key.type_name(),
                RejectReason::Unhashable(key.kind_name()),
            ));
        };
        if !seen.insert(hash_key) {
            return Err(Rejection::new(
                path.child(segment),
                key.type_name(),
                RejectReason::DuplicateKey(key.key_label()),
            ));
        }
    }
    Ok(())
}

/// Index labels must be hashable; duplicates are allowed.
fn check_labels(labels: &[Value], path: &ValuePath) -> Result<(), Rejection> {
    match labels.iter().position(|label| label.hash_key().is_none()) {
        Some(index) => {
            let label = &labels[index];
            Err(Rejection::new(
                path.child(PathSegment::IndexLabel(index)),
                label.type_name(),
                RejectReason::Unhashable(label.kind_name()),
            ))
        }
        None => Ok(()),
    }
}

fn check_length(
    field: &str,
    expected: usize,
    found: usize,
    path: &ValuePath,
    type_name: &TypeName,
) -> Result<(), Rejection> {
    if expected == found {
        return Ok(());
    }
    Err(Rejection::new(
        path.clone(),
        type_name.clone(),
        RejectReason::LengthMismatch {
            field: field.to_string(),
            expected,
            found,
        },
    ))
}

#[cfg(test)]
#[path = "tests/validate_tests.rs"]
mod tests;
