//! Module registry for auto-reload tooling
//!
//! Every merged file is registered under a synthetic dotted name so that a
//! file watcher can map changed fragments back to the settings they feed.
//! The engine only writes to the registry.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Default prefix of synthetic module names
pub const DEFAULT_PREFIX: &str = "_split_settings";

/// Receives one registration per merged fragment
pub trait ModuleRegistry {
    fn register(&self, name: &str, path: &Path);
}

/// Registry that drops every registration
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

impl ModuleRegistry for NoopRegistry {
    fn register(&self, _name: &str, _path: &Path) {}
}

/// In-memory registry, inspectable after a merge
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    modules: Mutex<BTreeMap<String, PathBuf>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all registrations
    pub fn modules(&self) -> BTreeMap<String, PathBuf> {
        self.lock().clone()
    }

    pub fn get(&self, name: &str) -> Option<PathBuf> {
        self.lock().get(name).cloned()
    }

    /// Name registered for `path`, if any
    pub fn name_of(&self, path: &Path) -> Option<String> {
        self.lock()
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(name, _)| name.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, PathBuf>> {
        self.modules.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ModuleRegistry for MemoryRegistry {
    fn register(&self, name: &str, path: &Path) {
        self.lock().insert(name.to_string(), path.to_path_buf());
    }
}

/// Synthetic module name for `path`
///
/// The path is taken relative to `root` when below it; directories become
/// dotted segments and the file's extension is dropped, so
/// `<root>/components/base.conf` maps to `<prefix>.components.base`.
pub fn module_name(prefix: &str, root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);

    let mut parts: Vec<String> = rel
        .parent()
        .map(|dir| {
            dir.components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    if let Some(stem) = rel.file_stem() {
        parts.push(stem.to_string_lossy().into_owned());
    }

    if parts.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{}", parts.join("."))
    }
}
