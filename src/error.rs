//! Error types for inclusion
//!
//! Resolution errors (`NotFound`, `WrongKind`, `PackageNotFound`) come from the
//! path resolver, `InvalidSpec` from the specification constructors, and the
//! remaining kinds from loading and executing fragments.

use std::path::PathBuf;

use crate::fragment::FragmentKind;

/// Result alias used throughout the crate
pub type Result<T, E = IncludeError> = std::result::Result<T, E>;

/// Errors raised while building specifications or including fragments
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    /// A required specification matched zero files
    #[error("No such file: {pattern}")]
    NotFound { pattern: String },

    /// A glob matched a fragment of the other kind
    #[error("A {found} fragment matched the {expected} pattern {pattern}: {}", path.display())]
    WrongKind {
        pattern: String,
        path: PathBuf,
        expected: FragmentKind,
        found: FragmentKind,
    },

    /// Construction-time misuse of a specification
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    /// A resource specification names a package that could not be located
    #[error("Package not found: {package}")]
    PackageNotFound { package: String },

    /// A compiled fragment's payload could not be deserialized
    #[error("Could not load compiled fragment {}: {reason}", path.display())]
    CorruptFragment { path: PathBuf, reason: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: name '{name}' is not defined", path.display())]
    UndefinedName { path: PathBuf, name: String },

    #[error("{}: cannot extend '{name}': {message}", path.display())]
    TypeMismatch {
        path: PathBuf,
        name: String,
        message: String,
    },

    #[error("{}: '{name}' is reserved for inclusion bookkeeping", path.display())]
    ReservedName { path: PathBuf, name: String },
}

impl IncludeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the error kind that `Optional` and `OneOf` absorb
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
