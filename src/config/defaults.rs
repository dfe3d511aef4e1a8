//! Built-in tool defaults (layer 1)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::registry::DEFAULT_PREFIX;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Prefix of registry module names (default: "_split_settings")
    pub registry_prefix: String,

    /// Directories searched for packages not named in `packages` (default: none)
    pub search_paths: Vec<PathBuf>,

    /// Package name to directory (default: none)
    pub packages: BTreeMap<String, PathBuf>,

    /// Show inclusion bookkeeping in merge output (default: false)
    pub show_bookkeeping: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            registry_prefix: DEFAULT_PREFIX.to_string(),
            search_paths: Vec::new(),
            packages: BTreeMap::new(),
            show_bookkeeping: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "registry_prefix": self.registry_prefix,
            "search_paths": self.search_paths,
            "packages": self.packages,
            "show_bookkeeping": self.show_bookkeeping,
        })
    }
}
