//! TOML configuration for limits and remote fetching.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PersistError, PersistResult};
use crate::resource::ResourceLimiter;

/// Settings for [`fetch`](crate::fetch).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// Whole-request timeout.
    pub timeout_secs: u64,
    /// Largest response body accepted.
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Top-level configuration file layout.
///
/// ```toml
/// [limits]
/// max_depth = 32
///
/// [fetch]
/// timeout_secs = 10
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistConfig {
    pub limits: ResourceLimiter,
    pub fetch: FetchSettings,
}

impl PersistConfig {
    pub fn from_toml_str(input: &str) -> PersistResult<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> PersistResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| PersistError::io(format!("read config {}", path.display()), err))?;
        Self::from_toml_str(&content)
    }
}
