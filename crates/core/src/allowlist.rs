//! Registry of reconstructible type shapes.
//!
//! The same list instance backs the save-time check and the load-time gate.
//! It is immutable once built; only [`AllowListBuilder`] adds entries.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::structured::DType;
use crate::value::TypeName;

/// What an allow-listed type may be rebuilt as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Self-contained scalar such as a complex number.
    Scalar,
    /// Ordered or unordered collection of values.
    Sequence,
    /// Key/value collection.
    Mapping,
    /// Element type of an array.
    Element,
    /// Named type decomposed into nested values.
    Structured,
}

/// Immutable mapping from type name to capability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeAllowList {
    entries: BTreeMap<TypeName, Capability>,
}

static STANDARD: OnceLock<Arc<TypeAllowList>> = OnceLock::new();

impl TypeAllowList {
    /// Process-wide standard list, built on first use.
    pub fn standard() -> &'static TypeAllowList {
        Self::shared_standard_ref()
    }

    /// The standard list as a shareable handle.
    pub fn shared_standard() -> Arc<TypeAllowList> {
        Arc::clone(Self::shared_standard_ref())
    }

    fn shared_standard_ref() -> &'static Arc<TypeAllowList> {
        STANDARD.get_or_init(|| Arc::new(Self::builder().standard_entries().build()))
    }

    /// A list that admits nothing beyond primitives.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> AllowListBuilder {
        AllowListBuilder::default()
    }

    pub fn lookup(&self, type_name: &TypeName) -> Option<Capability> {
        self.entries.get(type_name).copied()
    }

    pub fn contains(&self, type_name: &TypeName) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in type-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeName, Capability)> {
        self.entries.iter().map(|(name, capability)| (name, *capability))
    }
}

/// Collects entries for a [`TypeAllowList`].
#[derive(Clone, Debug, Default)]
pub struct AllowListBuilder {
    entries: BTreeMap<TypeName, Capability>,
}

impl AllowListBuilder {
    /// Adds or replaces one entry.
    pub fn allow(mut self, type_name: TypeName, capability: Capability) -> Self {
        self.entries.insert(type_name, capability);
        self
    }

    /// Registers a named type whose state is validated recursively.
    pub fn allow_structured(self, type_name: TypeName) -> Self {
        self.allow(type_name, Capability::Structured)
    }

    pub fn allow_dtype(self, dtype: DType) -> Self {
        self.allow(dtype.type_name(), Capability::Element)
    }

    /// Adds every entry of the standard list.
    pub fn standard_entries(self) -> Self {
        let builder = self
            .allow(TypeName::COMPLEX, Capability::Scalar)
            .allow(TypeName::LIST, Capability::Sequence)
            .allow(TypeName::TUPLE, Capability::Sequence)
            .allow(TypeName::SET, Capability::Sequence)
            .allow(TypeName::DICT, Capability::Mapping)
            .allow(TypeName::NDARRAY, Capability::Structured)
            .allow(TypeName::SERIES, Capability::Structured)
            .allow(TypeName::DATAFRAME, Capability::Structured);
        DType::ALL
            .into_iter()
            .filter(|dtype| *dtype != DType::Object)
            .fold(builder, |builder, dtype| builder.allow_dtype(dtype))
    }

    /// Removes an entry, e.g. to test a narrower list.
    pub fn deny(mut self, type_name: &TypeName) -> Self {
        self.entries.remove(type_name);
        self
    }

    pub fn build(self) -> TypeAllowList {
        TypeAllowList {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
#[path = "tests/allowlist_tests.rs"]
mod tests;
