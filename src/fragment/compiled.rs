//! Compiled fragments
//!
//! Layout: a 16-byte header followed by the serialized statements.
//!
//! | offset | size | field                         |
//! |--------|------|-------------------------------|
//! | 0      | 4    | magic `SSFC`                  |
//! | 4      | 4    | format version (LE)           |
//! | 8      | 4    | source mtime, seconds (LE)    |
//! | 12     | 4    | source size in bytes (LE)     |
//!
//! The loader skips the header without interpreting it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::{Fragment, FragmentKind, COMPILED_EXTENSION};
use crate::error::{IncludeError, Result};

/// Size of the header in front of the payload
pub const COMPILED_HEADER_SIZE: usize = 16;

/// First four bytes of every compiled fragment written by [`compile_file`]
pub const COMPILED_MAGIC: &[u8; 4] = b"SSFC";

const FORMAT_VERSION: u32 = 1;

fn corrupt(path: &Path, reason: impl Into<String>) -> IncludeError {
    IncludeError::CorruptFragment {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

pub(super) fn load_compiled(path: &Path) -> Result<Fragment> {
    let bytes = fs::read(path).map_err(|e| IncludeError::io(path, e))?;
    let payload = bytes
        .get(COMPILED_HEADER_SIZE..)
        .ok_or_else(|| corrupt(path, "file is shorter than the header"))?;

    let mut fragment: Fragment =
        serde_json::from_slice(payload).map_err(|e| corrupt(path, e.to_string()))?;
    fragment.path = path.to_path_buf();
    Ok(fragment)
}

/// Default destination for the compiled form of `source`
pub fn compiled_path_for(source: &Path) -> PathBuf {
    let mut name = source.file_stem().unwrap_or_default().to_os_string();
    name.push(COMPILED_EXTENSION);
    source.with_file_name(name)
}

/// Parse a source fragment and write its compiled form to `dest`
pub fn compile_file(source: &Path, dest: &Path) -> Result<()> {
    let fragment = super::load(source, FragmentKind::Source)?;
    let metadata = fs::metadata(source).map_err(|e| IncludeError::io(source, e))?;

    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| (d.as_secs() & 0xFFFF_FFFF) as u32);
    let size = (metadata.len() & 0xFFFF_FFFF) as u32;

    let mut out = Vec::with_capacity(COMPILED_HEADER_SIZE + 256);
    out.extend_from_slice(COMPILED_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&mtime.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    serde_json::to_writer(&mut out, &fragment)
        .map_err(|e| IncludeError::io(dest, io::Error::from(e)))?;

    fs::write(dest, out).map_err(|e| IncludeError::io(dest, e))?;
    tracing::debug!(source = %source.display(), dest = %dest.display(), "compiled fragment");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::load;
    use tempfile::TempDir;

    #[test]
    fn test_compiled_path_for() {
        assert_eq!(
            compiled_path_for(Path::new("/s/components/base.conf")),
            PathBuf::from("/s/components/base.confc")
        );
        assert_eq!(
            compiled_path_for(Path::new("/s/include")),
            PathBuf::from("/s/include.confc")
        );
    }

    #[test]
    fn test_compile_then_load_matches_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("database.conf");
        fs::write(&source, "ENGINE = 'sqlite'\nAPPS += ['db']\ninclude(optional('x.conf'))\n")
            .unwrap();
        let dest = compiled_path_for(&source);

        compile_file(&source, &dest).unwrap();

        let bytes = fs::read(&dest).unwrap();
        assert_eq!(&bytes[..4], COMPILED_MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), FORMAT_VERSION);

        let from_source = load(&source, FragmentKind::Source).unwrap();
        let from_compiled = load(&dest, FragmentKind::Compiled).unwrap();
        assert_eq!(from_compiled.statements(), from_source.statements());
        assert_eq!(from_compiled.path(), dest);
    }

    #[test]
    fn test_header_is_not_validated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("any.confc");
        let mut bytes = vec![0u8; COMPILED_HEADER_SIZE];
        bytes.extend_from_slice(br#"{"statements":[]}"#);
        fs::write(&path, bytes).unwrap();

        let fragment = load(&path, FragmentKind::Compiled).unwrap();
        assert!(fragment.statements().is_empty());
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.confc");
        fs::write(&path, b"SSFC").unwrap();

        let err = load(&path, FragmentKind::Compiled).unwrap_err();
        assert!(matches!(err, IncludeError::CorruptFragment { .. }));
    }

    #[test]
    fn test_garbage_payload_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.confc");
        let mut bytes = COMPILED_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        bytes.extend_from_slice(b"\x00\x01not a payload");
        fs::write(&path, bytes).unwrap();

        let err = load(&path, FragmentKind::Compiled).unwrap_err();
        assert!(err.to_string().contains("Could not load compiled fragment"));
    }

    #[test]
    fn test_wrong_payload_type_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.confc");
        let mut bytes = vec![0u8; COMPILED_HEADER_SIZE];
        bytes.extend_from_slice(b"[1, 2, 3]");
        fs::write(&path, bytes).unwrap();

        let err = load(&path, FragmentKind::Compiled).unwrap_err();
        assert!(matches!(err, IncludeError::CorruptFragment { .. }));
    }
}
