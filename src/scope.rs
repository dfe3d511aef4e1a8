//! The scope that fragments merge into
//!
//! Holds the merged values plus the bookkeeping the engine needs for nested
//! inclusion: the file currently being merged and every file merged so far.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Key under which the current-file marker is rendered
pub const INCLUDED_FILE_KEY: &str = "__included_file__";

/// Key under which the visited-files list is rendered
pub const INCLUDED_FILES_KEY: &str = "__included_files__";

/// Key under which the origin file is rendered
pub const FILE_KEY: &str = "__file__";

/// True for names fragments may not assign
pub fn is_reserved(name: &str) -> bool {
    matches!(name, INCLUDED_FILE_KEY | INCLUDED_FILES_KEY | FILE_KEY)
}

/// Mutable settings namespace
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    origin: PathBuf,
    values: Map<String, Value>,
    included_file: Option<PathBuf>,
    included_files: Option<Vec<PathBuf>>,
}

impl Scope {
    /// Empty scope owned by `origin`; relative specs resolve from its directory
    pub fn new(origin: impl Into<PathBuf>) -> Self {
        Self {
            origin: origin.into(),
            values: Map::new(),
            included_file: None,
            included_files: None,
        }
    }

    /// Scope pre-populated with values
    pub fn with_values(origin: impl Into<PathBuf>, values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Self::new(origin)
        }
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Merged values, without bookkeeping
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The fragment currently being merged, if inside an inclusion
    pub fn included_file(&self) -> Option<&Path> {
        self.included_file.as_deref()
    }

    /// Set or clear the current-file marker
    ///
    /// Hosts that run the root settings file themselves can preset it so
    /// relative specs resolve from that file's directory.
    pub fn set_included_file(&mut self, path: Option<PathBuf>) {
        self.included_file = path;
    }

    /// Every file merged into this scope, in merge order
    pub fn included_files(&self) -> &[PathBuf] {
        self.included_files.as_deref().unwrap_or_default()
    }

    /// True once an inclusion has run against this scope
    pub fn has_included_files(&self) -> bool {
        self.included_files.is_some()
    }

    pub(crate) fn ensure_included_files(&mut self) {
        self.included_files.get_or_insert_with(Vec::new);
    }

    /// Record `path` as merged; false when it already was
    pub(crate) fn mark_included(&mut self, path: &Path) -> bool {
        let files = self.included_files.get_or_insert_with(Vec::new);
        if files.iter().any(|f| f == path) {
            return false;
        }
        files.push(path.to_path_buf());
        true
    }

    /// Directory relative specs resolve from
    pub fn base_dir(&self) -> PathBuf {
        self.included_file
            .as_deref()
            .unwrap_or(self.origin.as_path())
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Values plus whatever bookkeeping is present, as one JSON object
    pub fn to_value(&self) -> Value {
        let mut out = self.values.clone();
        out.insert(
            FILE_KEY.to_string(),
            Value::String(self.origin.display().to_string()),
        );
        if let Some(current) = &self.included_file {
            out.insert(
                INCLUDED_FILE_KEY.to_string(),
                Value::String(current.display().to_string()),
            );
        }
        if let Some(files) = &self.included_files {
            out.insert(
                INCLUDED_FILES_KEY.to_string(),
                Value::Array(
                    files
                        .iter()
                        .map(|f| Value::String(f.display().to_string()))
                        .collect(),
                ),
            );
        }
        Value::Object(out)
    }
}
