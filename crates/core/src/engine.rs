//! Save and load entry points.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::allowlist::TypeAllowList;
use crate::codec;
use crate::config::{FetchSettings, PersistConfig};
use crate::document::{Document, Record};
use crate::error::{PersistError, PersistResult};
use crate::names::{CallShape, NameResolver};
use crate::resource::ResourceLimiter;
use crate::validate::StructuralValidator;
use crate::value::Value;

/// Whether a load runs values through the allow-list gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Trust {
    /// Refuse any value whose type is not allow-listed.
    #[default]
    Gated,
    /// Rebuild everything. Only for files whose origin is known.
    Trusted,
}

/// Saves and loads documents against one allow-list and one set of limits.
///
/// Cloning is cheap; the allow-list is shared.
#[derive(Clone, Debug)]
pub struct Persister {
    allow_list: Arc<TypeAllowList>,
    limits: ResourceLimiter,
    fetch: FetchSettings,
}

impl Default for Persister {
    fn default() -> Self {
        Self::standard()
    }
}

impl Persister {
    pub fn new(allow_list: Arc<TypeAllowList>, limits: ResourceLimiter) -> Self {
        Self {
            allow_list,
            limits,
            fetch: FetchSettings::default(),
        }
    }

    /// Standard allow-list with default limits.
    pub fn standard() -> Self {
        Self::new(TypeAllowList::shared_standard(), ResourceLimiter::default())
    }

    /// Standard allow-list with limits and fetch settings from `config`.
    pub fn from_config(config: &PersistConfig) -> Self {
        Self::new(TypeAllowList::shared_standard(), config.limits).with_fetch_settings(config.fetch)
    }

    pub fn with_allow_list(mut self, allow_list: Arc<TypeAllowList>) -> Self {
        self.allow_list = allow_list;
        self
    }

    pub fn with_fetch_settings(mut self, fetch: FetchSettings) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn allow_list(&self) -> &TypeAllowList {
        &self.allow_list
    }

    pub fn limits(&self) -> &ResourceLimiter {
        &self.limits
    }

    pub fn fetch_settings(&self) -> &FetchSettings {
        &self.fetch
    }

    pub fn validator(&self) -> StructuralValidator<'_> {
        StructuralValidator::new(&self.allow_list, &self.limits)
    }

    /// Whether `value` would pass the save-time check.
    pub fn can_save(&self, value: &Value) -> bool {
        self.validator().is_valid(value)
    }

    /// Validates every value of `document`; the first rejection wins.
    pub fn check(&self, document: &Document) -> PersistResult<()> {
        let validator = self.validator();
        for (name, value) in document.iter() {
            if let Err(rejection) = validator.validate_named(name, value) {
                debug!(%rejection, "document rejected");
                return Err(rejection.into());
            }
        }
        Ok(())
    }

    /// Validates then encodes `document`.
    pub fn encode(&self, document: &Document) -> PersistResult<Vec<u8>> {
        self.check(document)?;
        codec::encode(document)
    }

    pub fn decode(&self, bytes: &[u8], trust: Trust) -> PersistResult<Document> {
        if bytes.len() as u64 > self.limits.max_file_bytes {
            return Err(PersistError::ResourceLimit(format!(
                "{} bytes exceed the limit of {}",
                bytes.len(),
                self.limits.max_file_bytes
            )));
        }
        let document = codec::decode(bytes, self.validator(), trust).inspect_err(|err| {
            if let Some(rejection) = err.rejection() {
                debug!(%rejection, "load gate refused a value");
            }
        })?;
        Ok(document)
    }

    /// Validates, encodes and atomically writes `document` to `path`.
    ///
    /// Nothing is written unless every value passes validation; an existing
    /// file at `path` is only ever replaced by a complete new one.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>, document: &Document) -> PersistResult<()> {
        let bytes = self.encode(document)?;
        write_atomic(path.as_ref(), &bytes)?;
        info!(entries = document.len(), bytes = bytes.len(), "saved");
        Ok(())
    }

    /// Writes `document` without validating it.
    ///
    /// The result may be unloadable in gated mode; this exists to produce
    /// files for exercising the load gate.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save_unchecked(&self, path: impl AsRef<Path>, document: &Document) -> PersistResult<()> {
        let bytes = codec::encode(document)?;
        write_atomic(path.as_ref(), &bytes)?;
        warn!(entries = document.len(), bytes = bytes.len(), "saved without validation");
        Ok(())
    }

    /// Saves `values` under the names written in `call_source`, the text of a
    /// `save(destination, a, b, ...)` call.
    pub fn save_call(
        &self,
        path: impl AsRef<Path>,
        call_source: &str,
        values: Vec<Value>,
    ) -> PersistResult<()> {
        let names =
            NameResolver::new(CallShape::DestinationFirst).resolve(call_source, values.len())?;
        let document = Document::from_pairs(names.into_iter().zip(values))?;
        self.save(path, &document)
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display(), ?trust))]
    pub fn load_dict(&self, path: impl AsRef<Path>, trust: Trust) -> PersistResult<Document> {
        let path = path.as_ref();
        let bytes = self.read_bounded(path)?;
        let document = self.decode(&bytes, trust)?;
        info!(entries = document.len(), bytes = bytes.len(), "loaded");
        Ok(document)
    }

    /// Loads a file as a [`Record`] whose fields are the stored names.
    pub fn load(&self, path: impl AsRef<Path>, trust: Trust) -> PersistResult<Record> {
        Ok(self.load_dict(path, trust)?.into_record())
    }

    /// Downloads and decodes a document. Always gated.
    #[cfg(feature = "fetch")]
    #[instrument(skip(self))]
    pub fn fetch(&self, url: &str) -> PersistResult<Document> {
        let bytes = crate::fetch::get(url, &self.fetch)?;
        let document = self.decode(&bytes, Trust::Gated)?;
        info!(entries = document.len(), bytes = bytes.len(), "fetched");
        Ok(document)
    }

    fn read_bounded(&self, path: &Path) -> PersistResult<Vec<u8>> {
        let limit = self.limits.max_file_bytes;
        let file = File::open(path)
            .map_err(|err| PersistError::io(format!("open {}", path.display()), err))?;
        let mut bytes = Vec::new();
        file.take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|err| PersistError::io(format!("read {}", path.display()), err))?;
        if bytes.len() as u64 > limit {
            return Err(PersistError::ResourceLimit(format!(
                "{} is larger than {limit} bytes",
                path.display()
            )));
        }
        Ok(bytes)
    }
}

/// Writes through a synced temporary sibling that is renamed over `path`.
/// The temporary file is removed if any step fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> PersistResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::Builder::new()
        .prefix(".ppersist-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| {
            PersistError::io(format!("create temporary file in {}", parent.display()), err)
        })?;
    file.write_all(bytes)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|err| PersistError::io(format!("write {}", file.path().display()), err))?;
    file.persist(path)
        .map_err(|err| PersistError::io(format!("replace {}", path.display()), err.error))?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
