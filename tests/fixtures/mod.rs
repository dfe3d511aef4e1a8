//! Test fixtures for inclusion tests
//!
//! This module provides:
//! - Static settings trees under tests/fixtures (read-only)
//! - `SettingsTree`, a scratch tree of fragments in a temp directory

#![allow(dead_code)]

use split_settings::fragment::compile_file;
use split_settings::Scope;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Root of the static fixture directory
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Root settings file of the merged fixture
pub fn merged_settings_path() -> PathBuf {
    fixtures_dir().join("merged/settings.conf")
}

/// Directory of four fragments that extend one list in name order
pub fn sequential_dir() -> PathBuf {
    fixtures_dir().join("sequential.d")
}

/// Fragments written into a temp directory, removed on drop
pub struct SettingsTree {
    dir: TempDir,
}

impl SettingsTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a fragment, creating parent directories
    pub fn write(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture dir");
        }
        fs::write(&path, body).expect("Failed to write fixture");
        path
    }

    /// Compile `body` into a compiled fragment at `rel`
    ///
    /// The source is kept under a hidden directory so globs never match it.
    pub fn write_compiled(&self, rel: &str, body: &str) -> PathBuf {
        let source = self.write(&format!(".src/{rel}.conf"), body);
        let dest = self.path(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture dir");
        }
        compile_file(&source, &dest).expect("Failed to compile fixture");
        dest
    }

    /// Write raw bytes, for corrupt fixtures
    pub fn write_bytes(&self, rel: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture dir");
        }
        fs::write(&path, bytes).expect("Failed to write fixture");
        path
    }

    /// Fresh scope owned by `<root>/<rel>`
    pub fn scope(&self, rel: &str) -> Scope {
        Scope::new(self.path(rel))
    }
}

impl Default for SettingsTree {
    fn default() -> Self {
        Self::new()
    }
}
