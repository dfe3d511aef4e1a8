//! Effective tool configuration with provenance
//!
//! Built from defaults, an optional TOML file and CLI overrides. Relative
//! paths in the file are anchored to the file's directory before merging so
//! the result does not depend on where the tool was started.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::engine::Engine;
use crate::fragment::toml_to_json;
use crate::locator::{ChainLocator, MapLocator, SearchPathLocator};
use crate::registry::ModuleRegistry;

/// File picked up from the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "split-settings.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Prefix of registry module names
    pub registry_prefix: String,

    /// Roots searched for dotted package names
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Explicit package name to directory table; consulted before search paths
    #[serde(default)]
    pub packages: BTreeMap<String, PathBuf>,

    /// Show inclusion bookkeeping in merge output
    #[serde(default)]
    pub show_bookkeeping: bool,

    /// Contributing sources in precedence order
    #[serde(default, skip_deserializing)]
    pub sources: Vec<ConfigSource>,
}

fn prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("prefix regex")
    })
}

impl ToolConfig {
    /// Build the effective configuration from its layers
    pub fn build(
        config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        if let Some(path) = config_path {
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let mut config: ToolConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.sources = sources;
        config.validate()?;

        tracing::debug!(
            prefix = %config.registry_prefix,
            search_paths = config.search_paths.len(),
            packages = config.packages.len(),
            "tool configuration loaded"
        );
        Ok(config)
    }

    /// `split-settings.toml` in `dir`, if present
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        candidate.is_file().then_some(candidate)
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        let mut value = toml_to_json(toml_value);
        if let Some(dir) = path.parent() {
            anchor_paths(&mut value, dir);
        }
        Ok((value, digest))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !prefix_re().is_match(&self.registry_prefix) {
            return Err(ConfigError::ValidationError(format!(
                "registry_prefix must be a dotted identifier, got '{}'",
                self.registry_prefix
            )));
        }
        if let Some(name) = self.packages.keys().find(|name| name.is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "package name must not be empty (directory '{}')",
                self.packages[name].display()
            )));
        }
        Ok(())
    }

    /// Locator over the configured packages, then the search paths
    pub fn locator(&self) -> ChainLocator {
        let mut packages = MapLocator::new();
        for (name, dir) in &self.packages {
            packages.insert(name.as_str(), dir.as_path());
        }
        ChainLocator::new()
            .with(packages)
            .with(SearchPathLocator::new(self.search_paths.clone()))
    }

    /// Engine wired to this configuration
    ///
    /// Registry names are made relative to `root`.
    pub fn engine(&self, registry: Arc<dyn ModuleRegistry + Send + Sync>, root: &Path) -> Engine {
        Engine::new()
            .with_locator(self.locator())
            .with_registry(registry)
            .with_registry_prefix(self.registry_prefix.as_str())
            .with_registry_root(root)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Join relative `search_paths` and `packages` entries onto `dir`
fn anchor_paths(value: &mut Value, dir: &Path) {
    let anchor = |v: &mut Value| {
        if let Some(s) = v.as_str() {
            if Path::new(s).is_relative() {
                *v = Value::String(dir.join(s).to_string_lossy().into_owned());
            }
        }
    };

    if let Some(paths) = value.get_mut("search_paths").and_then(Value::as_array_mut) {
        paths.iter_mut().for_each(anchor);
    }
    if let Some(packages) = value.get_mut("packages").and_then(Value::as_object_mut) {
        packages.values_mut().for_each(anchor);
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
