//! SHA-256 digests for downloaded artifacts.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::{ProvisionError, Result};

/// Default read size when hashing files.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a file, reading `chunk_size` bytes at a time.
pub fn sha256_file(path: &Path, chunk_size: usize) -> Result<String> {
    let file = File::open(path)
        .map_err(|e| ProvisionError::fs("failed to open file for hashing", path, e))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| ProvisionError::fs("failed to read file for hashing", path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Check a file against an expected hex digest.
///
/// No expected digest means the check passes without reading the file. The
/// comparison ignores ASCII case so upper-case published checksums match.
pub fn verify_digest(path: &Path, expected: Option<&str>, chunk_size: usize) -> Result<bool> {
    let Some(expected) = expected else {
        return Ok(true);
    };
    let actual = sha256_file(path, chunk_size)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_sha256_bytes() {
        assert_eq!(sha256_bytes(b"hello"), HELLO);
    }

    #[test]
    fn test_sha256_file_small_chunks() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        std::fs::write(&path, "hello").unwrap();

        assert_eq!(sha256_file(&path, 2).unwrap(), HELLO);
    }

    #[test]
    fn test_verify_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        std::fs::write(&path, "hello").unwrap();

        assert!(verify_digest(&path, None, DEFAULT_CHUNK_SIZE).unwrap());
        assert!(verify_digest(&path, Some(HELLO), DEFAULT_CHUNK_SIZE).unwrap());
        assert!(verify_digest(&path, Some(&HELLO.to_uppercase()), DEFAULT_CHUNK_SIZE).unwrap());
        assert!(!verify_digest(&path, Some(&sha256_bytes(b"bye")), DEFAULT_CHUNK_SIZE).unwrap());
    }

    #[test]
    fn test_verify_digest_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.zip");

        assert!(verify_digest(&path, Some(HELLO), DEFAULT_CHUNK_SIZE).is_err());
    }
}
