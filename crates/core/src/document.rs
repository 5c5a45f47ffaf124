//! Named collections of values: the unit that is saved and loaded.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use crate::error::{FormatError, PersistError, PersistResult};
use crate::value::Value;

/// Why `name` does not follow the identifier grammar, if it doesn't.
///
/// Identifiers start with an ASCII letter followed by ASCII letters, digits
/// or underscores.
pub fn identifier_problem(name: &str) -> Option<&'static str> {
    let mut chars = name.chars();
    match chars.next() {
        None => Some("name is empty"),
        Some(first) if !first.is_ascii_alphabetic() => Some("name must start with a letter"),
        Some(_) if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            Some("name may only contain letters, digits and underscores")
        }
        Some(_) => None,
    }
}

pub fn is_identifier(name: &str) -> bool {
    identifier_problem(name).is_none()
}

/// Ordered mapping from variable name to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
    positions: HashMap<String, usize>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a variable. Names must be identifiers and unique.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> PersistResult<()> {
        let name = name.into();
        if let Some(reason) = identifier_problem(&name) {
            return Err(PersistError::InvalidName { name, reason });
        }
        if self.contains(&name) {
            return Err(PersistError::InvalidName {
                name,
                reason: "name is already present",
            });
        }
        self.push(name, value.into());
        Ok(())
    }

    fn push(&mut self, name: String, value: Value) {
        self.positions.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
    }

    /// Inserts `name`, or replaces its value in place when already present.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> PersistResult<()> {
        let name = name.into();
        if let Some(reason) = identifier_problem(&name) {
            return Err(PersistError::InvalidName { name, reason });
        }
        let value = value.into();
        match self.positions.get(&name) {
            Some(&position) => self.entries[position].1 = value,
            None => self.push(name, value),
        }
        Ok(())
    }

    /// Builder form of [`Document::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> PersistResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> PersistResult<Self>
    where
        N: Into<String>,
        V: Into<Value>,
    {
        let mut document = Self::new();
        for (name, value) in pairs {
            document.insert(name, value)?;
        }
        Ok(document)
    }

    /// Rebuilds a document from decoded pairs; bad names mean a damaged file.
    pub(crate) fn from_stored(entries: Vec<(String, Value)>) -> PersistResult<Self> {
        let mut document = Self::new();
        document.entries.reserve(entries.len());
        document.positions.reserve(entries.len());
        for (name, value) in entries {
            document.insert(name, value).map_err(|err| match err {
                PersistError::InvalidName { name, reason } => {
                    PersistError::Format(FormatError::StoredName { name, reason })
                }
                other => other,
            })?;
        }
        Ok(document)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.positions
            .get(name)
            .map(|&position| &self.entries[position].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names in stored order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_record(self) -> Record {
        let (names, values) = self.entries.into_iter().unzip();
        Record { names, values }
    }

    pub(crate) fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Fixed-field view of a loaded document, in stored order.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    names: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|index| &self.values[index])
    }

    pub fn field(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Moves a field out, leaving `Value::None` behind.
    pub fn take(&mut self, name: &str) -> PersistResult<Value> {
        let index = self
            .position(name)
            .ok_or_else(|| PersistError::MissingField(name.to_string()))?;
        Ok(std::mem::take(&mut self.values[index]))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Destructures a record with exactly `N` fields.
    pub fn into_array<const N: usize>(self) -> PersistResult<[Value; N]> {
        let found = self.values.len();
        self.values
            .try_into()
            .map_err(|_| PersistError::FieldCount { expected: N, found })
    }

    pub fn into_document(self) -> Document {
        let mut document = Document::new();
        for (name, value) in self.names.into_iter().zip(self.values) {
            document.push(name, value);
        }
        document
    }
}

impl Index<&str> for Record {
    type Output = Value;

    /// Panics when the field is absent; use [`Record::get`] otherwise.
    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(value) => value,
            None => panic!("record has no field `{name}`"),
        }
    }
}

impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Record with fields:")?;
        for name in &self.names {
            write!(f, "\n  {name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;
