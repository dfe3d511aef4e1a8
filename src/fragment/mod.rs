//! Settings fragments
//!
//! A fragment is one settings file. Source fragments are text made of
//! assignments and nested `include(...)` statements; compiled fragments hold
//! the same statements serialized behind a fixed-size header.

mod compiled;
mod parser;

pub use compiled::{compile_file, compiled_path_for, COMPILED_HEADER_SIZE, COMPILED_MAGIC};
pub use parser::parse;
pub(crate) use parser::toml_to_json;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{IncludeError, Result};

/// Extension of source fragments
pub const SOURCE_EXTENSION: &str = ".conf";

/// Extension of compiled fragments
pub const COMPILED_EXTENSION: &str = ".confc";

/// The two kinds of fragment a specification can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Source,
    Compiled,
}

impl FragmentKind {
    /// Classify a path by its extension; anything not compiled is source
    pub fn of_path(path: &Path) -> Self {
        if path.to_string_lossy().ends_with(COMPILED_EXTENSION) {
            Self::Compiled
        } else {
            Self::Source
        }
    }

    /// True when a path (or pattern) carries this kind's extension
    pub fn has_extension(&self, name: &str) -> bool {
        match self {
            Self::Source => name.ends_with(SOURCE_EXTENSION),
            Self::Compiled => name.ends_with(COMPILED_EXTENSION),
        }
    }

    /// The kind whose files must never match a pattern of this kind
    pub fn opposite(&self) -> Self {
        match self {
            Self::Source => Self::Compiled,
            Self::Compiled => Self::Source,
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Compiled => write!(f, "compiled"),
        }
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// A literal value
    Literal(Value),
    /// The current value of another name in the scope
    Name(String),
}

/// An unevaluated specification as written inside `include(...)`
///
/// Turned into a [`crate::Spec`] at execution time so that construction
/// errors and package lookups happen when the statement runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecExpr {
    Entry(String),
    Compiled(String),
    OneOf(Vec<SpecExpr>),
    Optional(Option<Box<SpecExpr>>),
    Resource { package: String, filename: String },
}

/// One statement of a fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    /// `NAME = expr`
    Assign { name: String, value: Expr, line: usize },
    /// `NAME += expr`
    Extend { name: String, value: Expr, line: usize },
    /// `del NAME`
    Delete { name: String, line: usize },
    /// `include(spec, ...)`
    Include { specs: Vec<SpecExpr>, line: usize },
}

impl Statement {
    pub fn line(&self) -> usize {
        match self {
            Self::Assign { line, .. }
            | Self::Extend { line, .. }
            | Self::Delete { line, .. }
            | Self::Include { line, .. } => *line,
        }
    }
}

/// An executable unit: the statements of one fragment, tied to its file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(skip)]
    path: PathBuf,
    statements: Vec<Statement>,
}

impl Fragment {
    pub fn new(path: impl Into<PathBuf>, statements: Vec<Statement>) -> Self {
        Self {
            path: path.into(),
            statements,
        }
    }

    /// The file this unit was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

/// Load a fragment of the given kind from disk
pub fn load(path: &Path, kind: FragmentKind) -> Result<Fragment> {
    match kind {
        FragmentKind::Source => load_source(path),
        FragmentKind::Compiled => compiled::load_compiled(path),
    }
}

fn load_source(path: &Path) -> Result<Fragment> {
    let bytes = fs::read(path).map_err(|e| IncludeError::io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|e| {
        IncludeError::io(path, io::Error::new(io::ErrorKind::InvalidData, e))
    })?;
    parse(path, &text)
}
