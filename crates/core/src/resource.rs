use serde::{Deserialize, Serialize};

/// Bounds applied to values and files on both the save and load paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceLimiter {
    /// Deepest nesting accepted below a top-level value (which sits at 0).
    pub max_depth: usize,
    /// Largest file `load` will read.
    pub max_file_bytes: u64,
}

impl Default for ResourceLimiter {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_file_bytes: 512 * 1024 * 1024,
        }
    }
}
