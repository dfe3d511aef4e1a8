//! Path resolution
//!
//! Expands a [`Spec`] relative to a base directory into the ordered list of
//! absolute fragment paths it selects. Glob matches are yielded in
//! lexicographic order so repeated runs merge fragments identically.

use glob::{MatchOptions, Pattern};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{IncludeError, Result};
use crate::fragment::FragmentKind;
use crate::spec::Spec;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A concrete fragment selected by a specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub kind: FragmentKind,
}

/// Resolve `spec` against `base_dir`
pub fn resolve(spec: &Spec, base_dir: &Path) -> Result<Vec<ResolvedFile>> {
    match spec {
        Spec::Entry(pattern) => expand(base_dir, pattern, FragmentKind::Source),
        Spec::Compiled(pattern) => expand(base_dir, pattern, FragmentKind::Compiled),
        Spec::OneOf(alternatives) => {
            let mut files = Vec::new();
            for alternative in alternatives {
                match resolve(alternative, base_dir) {
                    Ok(found) => files.extend(found),
                    Err(e) if e.is_not_found() => {
                        debug!(alternative = %alternative, "one_of alternative not found");
                    }
                    Err(e) => return Err(e),
                }
            }
            if files.is_empty() {
                return Err(IncludeError::NotFound {
                    pattern: spec.to_string(),
                });
            }
            Ok(files)
        }
        Spec::Optional(inner) => {
            if spec.is_inert() {
                return Ok(Vec::new());
            }
            match resolve(inner, base_dir) {
                Err(e) if e.is_not_found() => {
                    debug!(spec = %inner, "optional fragment not found");
                    Ok(Vec::new())
                }
                other => other,
            }
        }
        Spec::Resource(resource) => {
            let base = resource
                .base()
                .ok_or_else(|| IncludeError::PackageNotFound {
                    package: resource.package().to_string(),
                })?;
            let kind = FragmentKind::of_path(Path::new(resource.filename()));
            expand(base, resource.filename(), kind)
        }
    }
}

/// Glob-expand one pattern and check the matches are all of `kind`
fn expand(base_dir: &Path, pattern: &str, kind: FragmentKind) -> Result<Vec<ResolvedFile>> {
    let invalid = |e: glob::PatternError| {
        IncludeError::InvalidSpec(format!("Invalid pattern {pattern}: {e}"))
    };
    Pattern::new(pattern).map_err(invalid)?;

    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let base = base_dir.to_str().ok_or_else(|| {
            IncludeError::io(
                base_dir,
                io::Error::new(io::ErrorKind::InvalidData, "directory name is not valid UTF-8"),
            )
        })?;
        let escaped = Pattern::escape(base);
        Path::new(&escaped).join(pattern).to_string_lossy().into_owned()
    };

    let paths = glob::glob_with(&full_pattern, MATCH_OPTIONS).map_err(invalid)?;

    let mut files = Vec::new();
    for path in paths {
        let path = path.map_err(|e| {
            let at = e.path().to_path_buf();
            IncludeError::io(at, io::Error::from(e))
        })?;
        if !path.is_file() {
            continue;
        }
        let path = absolute(&path).map_err(|e| IncludeError::io(&path, e))?;
        files.push(path);
    }

    if files.is_empty() {
        return Err(IncludeError::NotFound {
            pattern: full_pattern,
        });
    }

    let wrong = kind.opposite();
    if let Some(bad) = files.iter().find(|p| wrong.has_extension(&p.to_string_lossy())) {
        return Err(IncludeError::WrongKind {
            pattern: pattern.to_string(),
            path: bad.clone(),
            expected: kind,
            found: wrong,
        });
    }

    debug!(pattern = %full_pattern, matches = files.len(), "expanded pattern");
    Ok(files
        .into_iter()
        .map(|path| ResolvedFile { path, kind })
        .collect())
}

/// Absolute, lexically normalised form of `path`
///
/// `..` is folded without touching the filesystem so the same file reached
/// through different relative spellings compares equal.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::MapLocator;
    use crate::spec::{compiled, entry, one_of, optional, resource};
    use std::fs;
    use tempfile::TempDir;

    fn tree(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "A = 1\n").unwrap();
        }
        dir
    }

    fn names(files: &[ResolvedFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_entry_not_found() {
        let dir = tree(&[]);
        let err = resolve(&entry("non_existent.conf").unwrap(), dir.path()).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("No such file"));
    }

    #[test]
    fn test_entry_glob_is_sorted() {
        let dir = tree(&["c.conf", "a.conf", "b.conf", "notes.txt"]);
        let files = resolve(&entry("*.conf").unwrap(), dir.path()).unwrap();
        assert_eq!(names(&files), vec!["a.conf", "b.conf", "c.conf"]);
        assert!(files.iter().all(|f| f.path.is_absolute()));
        assert!(files.iter().all(|f| f.kind == FragmentKind::Source));
    }

    #[test]
    fn test_entry_skips_directories_and_hidden_files() {
        let dir = tree(&["sub/inner.conf", ".hidden.conf", "visible.conf"]);
        let files = resolve(&entry("*").unwrap(), dir.path()).unwrap();
        assert_eq!(names(&files), vec!["visible.conf"]);
    }

    #[test]
    fn test_entry_rejects_compiled_match() {
        let dir = tree(&["fixture.conf", "fixture.confc"]);
        let err = resolve(&entry("fixture*").unwrap(), dir.path()).unwrap_err();
        match err {
            IncludeError::WrongKind { expected, found, .. } => {
                assert_eq!(expected, FragmentKind::Source);
                assert_eq!(found, FragmentKind::Compiled);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compiled_rejects_source_match() {
        let dir = tree(&["fixture.conf", "fixture.confc"]);
        let err = resolve(&compiled("fixture*").unwrap(), dir.path()).unwrap_err();
        assert!(matches!(
            err,
            IncludeError::WrongKind { expected: FragmentKind::Compiled, .. }
        ));
    }

    #[test]
    fn test_compiled_kind_is_recorded() {
        let dir = tree(&["fixture.confc"]);
        let files = resolve(&compiled("fixture.confc").unwrap(), dir.path()).unwrap();
        assert_eq!(files[0].kind, FragmentKind::Compiled);
    }

    #[test]
    fn test_one_of_returns_all_found_in_order() {
        let dir = tree(&["present1.conf", "present2.conf"]);
        let spec = one_of(["missing.conf", "present2.conf", "present1.conf"]).unwrap();
        let files = resolve(&spec, dir.path()).unwrap();
        assert_eq!(names(&files), vec!["present2.conf", "present1.conf"]);
    }

    #[test]
    fn test_one_of_with_compiled_alternative() {
        let dir = tree(&["fixture.confc"]);
        let spec = one_of(vec![
            compiled("non_existent.confc").unwrap(),
            compiled("fixture.confc").unwrap(),
        ])
        .unwrap();
        let files = resolve(&spec, dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, dir.path().join("fixture.confc"));
    }

    #[test]
    fn test_one_of_all_missing() {
        let dir = tree(&[]);
        let spec = one_of(["non_existent.conf", "also_non_existent.conf"]).unwrap();
        let err = resolve(&spec, dir.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No such file: (non_existent.conf, also_non_existent.conf)"
        );
    }

    #[test]
    fn test_one_of_does_not_absorb_wrong_kind() {
        let dir = tree(&["fixture.conf", "fixture.confc"]);
        let spec = one_of(["missing.conf", "fixture*"]).unwrap();
        assert!(matches!(
            resolve(&spec, dir.path()),
            Err(IncludeError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_optional_absorbs_not_found() {
        let dir = tree(&[]);
        assert!(resolve(&optional("missing.conf").unwrap(), dir.path())
            .unwrap()
            .is_empty());
        assert!(resolve(&optional(compiled("missing.confc").unwrap()).unwrap(), dir.path())
            .unwrap()
            .is_empty());
        let spec = optional(one_of(["a.conf", "b.conf"]).unwrap()).unwrap();
        assert!(resolve(&spec, dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_optional_does_not_absorb_wrong_kind() {
        let dir = tree(&["fixture.conf", "fixture.confc"]);
        let spec = optional("fixture*").unwrap();
        assert!(matches!(
            resolve(&spec, dir.path()),
            Err(IncludeError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_inert_optional_never_touches_filesystem() {
        let spec = optional(None::<&str>).unwrap();
        assert!(resolve(&spec, Path::new("/definitely/not/here")).unwrap().is_empty());
    }

    #[test]
    fn test_resource_resolves_against_package_dir() {
        let pkg = tree(&["base.conf"]);
        let locator = MapLocator::new().with_package("app.settings", pkg.path());
        let spec = resource("app.settings", "base.conf", &locator);

        let files = resolve(&spec, Path::new("/elsewhere")).unwrap();
        assert_eq!(files[0].path, pkg.path().join("base.conf"));

        let missing = resource("app.settings", "missing.conf", &locator);
        assert!(resolve(&missing, Path::new("/elsewhere")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_resource_unknown_package() {
        let spec = resource("ghost", "base.conf", &MapLocator::new());
        let err = resolve(&spec, Path::new("/")).unwrap_err();
        assert_eq!(err.to_string(), "Package not found: ghost");

        // Optional only absorbs missing files
        let spec = optional(spec).unwrap();
        assert!(matches!(
            resolve(&spec, Path::new("/")),
            Err(IncludeError::PackageNotFound { .. })
        ));
    }

    #[test]
    fn test_base_dir_with_glob_metacharacters() {
        let root = TempDir::new().unwrap();
        let base = root.path().join("odd[dir]");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("a.conf"), "A = 1\n").unwrap();

        let files = resolve(&entry("*.conf").unwrap(), &base).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_base_dir_is_an_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = TempDir::new().unwrap();
        let base = root.path().join(OsStr::from_bytes(b"caf\xe9"));
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("local.conf"), "X = 1\n").unwrap();

        let err = resolve(&entry("local.conf").unwrap(), &base).unwrap_err();
        assert!(matches!(err, IncludeError::Io { ref path, .. } if path == &base));

        // Must not be absorbed as a missing file
        let err = resolve(&optional("local.conf").unwrap(), &base).unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_invalid_glob_syntax() {
        let dir = tree(&[]);
        let err = resolve(&entry("[abc.conf").unwrap(), dir.path()).unwrap_err();
        match err {
            IncludeError::InvalidSpec(message) => {
                assert!(message.contains("[abc.conf"), "{message}");
                // Position is within the pattern as written, not the joined path
                assert!(message.contains("position 0"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parent_components_are_folded() {
        let dir = tree(&["components/base.conf", "other/x.conf"]);
        let files = resolve(&entry("../components/base.conf").unwrap(), &dir.path().join("other"))
            .unwrap();
        assert_eq!(files[0].path, dir.path().join("components/base.conf"));
    }

    #[test]
    fn test_absolute_normalises() {
        assert_eq!(
            absolute(Path::new("/a/b/../c/./d.conf")).unwrap(),
            PathBuf::from("/a/c/d.conf")
        );
    }
}
