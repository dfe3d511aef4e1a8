//! Package location for resource specifications

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Answers "where is this package on disk"
pub trait PackageLocator {
    fn locate(&self, package: &str) -> Option<PathBuf>;
}

/// Locator that knows no packages
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocator;

impl PackageLocator for NoLocator {
    fn locate(&self, _package: &str) -> Option<PathBuf> {
        None
    }
}

/// Explicit table of package name to directory
#[derive(Debug, Clone, Default)]
pub struct MapLocator {
    packages: BTreeMap<String, PathBuf>,
}

impl MapLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.insert(name, dir);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, dir: impl Into<PathBuf>) {
        self.packages.insert(name.into(), dir.into());
    }
}

impl PackageLocator for MapLocator {
    fn locate(&self, package: &str) -> Option<PathBuf> {
        self.packages.get(package).cloned()
    }
}

/// Maps dotted names onto directories below a list of search roots
///
/// `app.settings` is found at `<root>/app/settings` under the first root
/// where that directory exists.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLocator {
    roots: Vec<PathBuf>,
}

impl SearchPathLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn relative_dir(package: &str) -> Option<PathBuf> {
        if package.split('.').any(|part| part.is_empty() || part == "..") {
            return None;
        }
        Some(package.split('.').collect())
    }
}

impl PackageLocator for SearchPathLocator {
    fn locate(&self, package: &str) -> Option<PathBuf> {
        let rel = Self::relative_dir(package)?;
        self.roots
            .iter()
            .map(|root| root.join(&rel))
            .find(|dir| dir.is_dir())
    }
}

/// Tries each locator in order
#[derive(Default)]
pub struct ChainLocator {
    locators: Vec<Box<dyn PackageLocator + Send + Sync>>,
}

impl ChainLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: impl PackageLocator + Send + Sync + 'static) -> Self {
        self.locators.push(Box::new(locator));
        self
    }
}

impl PackageLocator for ChainLocator {
    fn locate(&self, package: &str) -> Option<PathBuf> {
        self.locators.iter().find_map(|l| l.locate(package))
    }
}
