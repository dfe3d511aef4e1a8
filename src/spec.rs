//! Reference specifications
//!
//! Declarative descriptions of which fragments to include. Build them with
//! [`entry`], [`compiled`], [`one_of`], [`optional`] and [`resource`] rather
//! than the variants directly, so the extension rules are checked.

use std::fmt;
use std::path::PathBuf;

use crate::error::{IncludeError, Result};
use crate::fragment::FragmentKind;
use crate::locator::PackageLocator;

/// What to include
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spec {
    /// Glob pattern for source fragments; `""` is the inert entry
    Entry(String),
    /// Glob pattern for compiled fragments
    Compiled(String),
    /// Every alternative that matches, in declared order
    OneOf(Vec<Spec>),
    /// Missing files are not an error
    Optional(Box<Spec>),
    /// A file inside an installed package
    Resource(Resource),
}

/// A file located relative to a package directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    package: String,
    filename: String,
    base: Option<PathBuf>,
}

impl Resource {
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Package directory, `None` when the package could not be located
    pub fn base(&self) -> Option<&std::path::Path> {
        self.base.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.base.is_some()
    }
}

/// A package given either by name or by an already known directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRef {
    Name(String),
    Path(PathBuf),
}

impl From<&str> for PackageRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PackageRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<PathBuf> for PackageRef {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for PackageRef {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl Spec {
    /// An `Optional` around the empty entry; never resolved
    pub fn is_inert(&self) -> bool {
        matches!(self, Spec::Optional(inner) if matches!(inner.as_ref(), Spec::Entry(p) if p.is_empty()))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Spec::Optional(_))
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Spec::Entry(pattern) | Spec::Compiled(pattern) => write!(f, "{pattern}"),
            Spec::OneOf(alternatives) => {
                write!(f, "(")?;
                for (i, alternative) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{alternative}")?;
                }
                write!(f, ")")
            }
            Spec::Optional(inner) => write!(f, "{inner}"),
            Spec::Resource(resource) => write!(f, "{}:{}", resource.package, resource.filename),
        }
    }
}

/// Conversion into a specification, so constructors accept patterns or specs
pub trait IntoSpec {
    fn into_spec(self) -> Result<Spec>;
}

impl IntoSpec for Spec {
    fn into_spec(self) -> Result<Spec> {
        Ok(self)
    }
}

impl IntoSpec for &str {
    fn into_spec(self) -> Result<Spec> {
        entry(self)
    }
}

impl IntoSpec for String {
    fn into_spec(self) -> Result<Spec> {
        entry(self)
    }
}

impl<T: IntoSpec> IntoSpec for Option<T> {
    fn into_spec(self) -> Result<Spec> {
        match self {
            Some(inner) => inner.into_spec(),
            None => Ok(Spec::Entry(String::new())),
        }
    }
}

/// A source fragment pattern
pub fn entry(pattern: impl Into<String>) -> Result<Spec> {
    let pattern = pattern.into();
    if FragmentKind::Compiled.has_extension(&pattern) {
        return Err(IncludeError::InvalidSpec(format!(
            "Expected a source fragment: {pattern}"
        )));
    }
    Ok(Spec::Entry(pattern))
}

/// A compiled fragment pattern
pub fn compiled(pattern: impl Into<String>) -> Result<Spec> {
    let pattern = pattern.into();
    if FragmentKind::Source.has_extension(&pattern) {
        return Err(IncludeError::InvalidSpec(format!(
            "Expected a compiled fragment: {pattern}"
        )));
    }
    Ok(Spec::Compiled(pattern))
}

/// Alternatives resolved in order; strings become entries
pub fn one_of<I>(alternatives: I) -> Result<Spec>
where
    I: IntoIterator,
    I::Item: IntoSpec,
{
    let alternatives = alternatives
        .into_iter()
        .map(IntoSpec::into_spec)
        .collect::<Result<Vec<_>>>()?;

    if alternatives.is_empty() {
        return Err(IncludeError::InvalidSpec(
            "Expected at least 1 argument but received 0.".to_string(),
        ));
    }
    if let Some(other) = alternatives
        .iter()
        .find(|alt| !matches!(alt, Spec::Entry(_) | Spec::Compiled(_)))
    {
        return Err(IncludeError::InvalidSpec(format!(
            "one_of accepts entry or compiled alternatives, got {other}"
        )));
    }
    Ok(Spec::OneOf(alternatives))
}

/// Mark a pattern or specification optional; `None` gives the inert spec
pub fn optional(inner: impl IntoSpec) -> Result<Spec> {
    Ok(Spec::Optional(Box::new(inner.into_spec()?)))
}

/// A file inside `package`, located through `locator`
///
/// An unknown package is not an error here; resolving the spec later fails
/// with [`IncludeError::PackageNotFound`].
pub fn resource(
    package: impl Into<PackageRef>,
    filename: impl Into<String>,
    locator: &dyn PackageLocator,
) -> Spec {
    let (package, base) = match package.into() {
        PackageRef::Name(name) => {
            let base = locator.locate(&name);
            (name, base)
        }
        PackageRef::Path(dir) => (dir.display().to_string(), Some(dir)),
    };
    if base.is_none() {
        tracing::debug!(%package, "package could not be located");
    }
    Spec::Resource(Resource {
        package,
        filename: filename.into(),
        base,
    })
}
