//! Filesystem utilities.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::{ProvisionError, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path)
            .map_err(|e| ProvisionError::fs("failed to create directory", path, e))?;
    }
    Ok(())
}

/// Resolve a path against the current directory without touching the disk.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| ProvisionError::fs("failed to resolve", path, e))
}

/// Replace `path` with `contents` in one rename.
///
/// The bytes go to a temporary file in the same directory first, so readers
/// see either the old file or the complete new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| ProvisionError::fs("failed to create temporary file in", parent, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ProvisionError::fs("failed to write", tmp.path().to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| ProvisionError::fs("failed to replace", path, e.error))?;
    Ok(())
}

/// Size of a file, or `None` if it does not exist.
pub fn file_len(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ProvisionError::fs("failed to stat", path, e)),
    }
}

/// Remove a file if it exists.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Copy a file, creating the destination's parent directory.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst).map_err(|e| ProvisionError::fs("failed to copy", src, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("status.json");

        write_atomic(&path, b"{\"a\":1}").unwrap();
        write_atomic(&path, b"{\"a\":2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":2}");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_file_len() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.bin");
        assert_eq!(file_len(&path).unwrap(), None);

        fs::write(&path, [0u8; 10]).unwrap();
        assert_eq!(file_len(&path).unwrap(), Some(10));
    }

    #[test]
    fn test_remove_file_if_exists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.bin");
        assert!(!remove_file_if_exists(&path).unwrap());

        fs::write(&path, "x").unwrap();
        assert!(remove_file_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(absolute(tmp.path()).unwrap(), tmp.path());
        assert!(absolute(Path::new("downloads/a.zip")).unwrap().is_absolute());
    }
}
