//! Accumulating saves whose destination is computed once.

use std::path::{Path, PathBuf};

use crate::document::{identifier_problem, Document};
use crate::engine::Persister;
use crate::error::{PersistError, PersistResult};
use crate::names::{CallShape, NameResolver};
use crate::value::Value;

/// Collects variables over several calls and writes them in one file.
///
/// Values are validated as they are added, so a bad value is reported at the
/// call that added it. Nothing touches the filesystem until [`Saver::finish`].
/// Adding a name twice keeps the later value.
///
/// ```no_run
/// # fn main() -> ppersist::PersistResult<()> {
/// let alpha = vec![1, 2, 3];
/// let mut saver = ppersist::Saver::new(std::env::temp_dir().join("run.ppst"));
/// ppersist::save_into!(saver, alpha)?;
/// saver.add("beta", 2.5)?;
/// saver.finish()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Saver {
    destination: PathBuf,
    document: Document,
    persister: Persister,
}

impl Saver {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self::with_persister(destination, Persister::standard())
    }

    pub fn with_persister(destination: impl Into<PathBuf>, persister: Persister) -> Self {
        Self {
            destination: destination.into(),
            document: Document::new(),
            persister,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn add(&mut self, name: &str, value: impl Into<Value>) -> PersistResult<&mut Self> {
        if let Some(reason) = identifier_problem(name) {
            return Err(PersistError::InvalidName {
                name: name.to_string(),
                reason,
            });
        }
        let value = value.into();
        self.persister.validator().validate_named(name, &value)?;
        self.document.set(name, value)?;
        Ok(self)
    }

    /// Adds `values` under the names written in `call_source`, the text of an
    /// `add(a, b, ...)` call. Either every value is added or none is.
    pub fn add_call(&mut self, call_source: &str, values: Vec<Value>) -> PersistResult<()> {
        let names = NameResolver::new(CallShape::NamesOnly).resolve(call_source, values.len())?;
        let validator = self.persister.validator();
        for (name, value) in names.iter().zip(&values) {
            validator.validate_named(name, value)?;
        }
        for (name, value) in names.into_iter().zip(values) {
            self.document.set(name, value)?;
        }
        Ok(())
    }

    /// Writes everything added so far.
    pub fn finish(self) -> PersistResult<()> {
        self.persister.save(&self.destination, &self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Trust;
    use crate::structured::Object;
    use crate::value::TypeName;

    #[test]
    fn nothing_is_written_before_finish() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("acc.ppst");
        let mut saver = Saver::new(&path);
        saver.add("a", 1).expect("a");
        saver
            .add_call("saver.add(b, c)", vec![Value::from("two"), Value::from(3.0)])
            .expect("b and c");
        assert!(!path.exists());
        saver.finish().expect("finish");

        let document = Persister::standard()
            .load_dict(&path, Trust::Gated)
            .expect("load");
        assert_eq!(document.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn bad_values_are_refused_at_add_time() {
        let mut saver = Saver::new("unused.ppst");
        let evil = Value::Object(Object::new(TypeName::new("app", "Evil"), Value::None));
        let err = saver
            .add_call("add(good, bad)", vec![Value::Int(1), evil])
            .expect_err("bad value");
        assert!(err.rejection().is_some());
        assert!(saver.document().is_empty(), "all or nothing");

        assert!(matches!(
            saver.add("9lives", 1),
            Err(PersistError::InvalidName { .. })
        ));
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let mut saver = Saver::new("unused.ppst");
        saver.add("x", 1).expect("first");
        saver.add("x", 2).expect("second");
        assert_eq!(saver.document().get("x"), Some(&Value::Int(2)));
        assert_eq!(saver.document().len(), 1);
    }
}
