//! Persist named values to a file and load them back, safely.
//!
//! Two guarantees set this apart from a plain serializer:
//!
//! * a file written by [`save_dict`] (or [`save!`]) can always be read back,
//!   because every value is checked against the same [`TypeAllowList`] the
//!   loader uses before a single byte is written;
//! * loading never rebuilds a type that is not on the allow-list; the check
//!   runs as each value is decoded, before it is linked into its parent.
//!
//! ```no_run
//! use ppersist::{Document, Trust, Value};
//!
//! # fn main() -> ppersist::PersistResult<()> {
//! let document = Document::new()
//!     .with("x", 1)?
//!     .with("y", vec![1, 2, 3])?;
//! ppersist::save_dict("data.ppst", &document)?;
//!
//! let record = ppersist::load("data.ppst", Trust::Gated)?;
//! assert_eq!(record["x"], Value::Int(1));
//! # Ok(())
//! # }
//! ```

mod allowlist;
mod codec;
mod config;
mod document;
mod engine;
mod error;
#[cfg(feature = "fetch")]
mod fetch;
mod json;
mod macros;
mod names;
mod resource;
mod saver;
mod structured;
mod validate;
mod value;
mod version;

use std::path::Path;

pub use allowlist::{AllowListBuilder, Capability, TypeAllowList};
pub use codec::{decode, encode, inspect, EnvelopeInfo};
pub use config::{FetchSettings, PersistConfig};
pub use document::{identifier_problem, is_identifier, Document, Record};
pub use engine::{Persister, Trust};
pub use error::{FormatError, PersistError, PersistResult};
pub use names::{CallShape, NameResolver};
pub use resource::ResourceLimiter;
pub use saver::Saver;
pub use structured::{Array, Column, DType, DataFrame, Object, Series};
pub use validate::{PathSegment, RejectReason, Rejection, StructuralValidator, ValuePath};
pub use value::{Complex, ToValue, TypeName, Value};
pub use version::{FILE_MAGIC, FORMAT_VERSION};

/// Whether `value` passes the standard save-time check.
pub fn can_save(value: &Value) -> bool {
    StructuralValidator::standard().is_valid(value)
}

/// Saves `document` to `path` with the standard allow-list.
pub fn save_dict(path: impl AsRef<Path>, document: &Document) -> PersistResult<()> {
    Persister::standard().save(path, document)
}

/// Saves `document` without validating it; see [`Persister::save_unchecked`].
pub fn save_dict_unchecked(path: impl AsRef<Path>, document: &Document) -> PersistResult<()> {
    Persister::standard().save_unchecked(path, document)
}

/// Backs [`save!`]; `call_source` is the text of the save call.
pub fn save_call(
    path: impl AsRef<Path>,
    call_source: &str,
    values: Vec<Value>,
) -> PersistResult<()> {
    Persister::standard().save_call(path, call_source, values)
}

pub fn load(path: impl AsRef<Path>, trust: Trust) -> PersistResult<Record> {
    Persister::standard().load(path, trust)
}

pub fn load_dict(path: impl AsRef<Path>, trust: Trust) -> PersistResult<Document> {
    Persister::standard().load_dict(path, trust)
}

/// Downloads a file and loads it like [`load`]. There is no trusted mode.
#[cfg(feature = "fetch")]
pub fn fetch(url: &str) -> PersistResult<Record> {
    Ok(Persister::standard().fetch(url)?.into_record())
}

#[doc(hidden)]
pub fn __announce_bound(names: &[&str]) {
    tracing::info!(names = %names.join(", "), "loaded variables into scope");
}
