//! Archive extraction.
//!
//! Gzipped tarballs are unpacked in-process. Zip archives are handed to
//! `unzip` through the process runner.

use std::fs::File;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::errors::{ProvisionError, Result};
use crate::util::fs::ensure_dir;
use crate::util::log::Log;
use crate::util::process::{ProcessBuilder, ProcessRunner};

/// Archive formats the extract stage understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Guess the format from the file name.
    pub fn detect(path: &Path) -> Option<ArchiveKind> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `dest`.
///
/// Re-running over a partially extracted tree overwrites what is there.
pub fn extract(archive: &Path, dest: &Path, runner: &dyn ProcessRunner, log: &Log) -> Result<()> {
    let kind = ArchiveKind::detect(archive).ok_or_else(|| {
        ProvisionError::InvalidInput(format!("unsupported archive: {}", archive.display()))
    })?;
    ensure_dir(dest)?;

    log.info(format!("Extracting {}", archive.display()));
    match kind {
        ArchiveKind::TarGz => unpack_tar_gz(archive, dest, log),
        ArchiveKind::Zip => {
            let cmd = ProcessBuilder::new("unzip")
                .args(["-q", "-o"])
                .arg(archive)
                .cwd(dest);
            runner.run_checked(&cmd).map(|_| ())
        }
    }
}

/// Whether `archive` reads back without errors.
///
/// Zip archives are tested with `unzip -tq`. Tarballs are decompressed and
/// every entry is read through without writing anything.
pub fn is_intact(archive: &Path, runner: &dyn ProcessRunner) -> bool {
    match ArchiveKind::detect(archive) {
        Some(ArchiveKind::Zip) => runner
            .run(&ProcessBuilder::new("unzip").arg("-tq").arg(archive))
            .success,
        Some(ArchiveKind::TarGz) => read_tar_gz(archive).is_ok(),
        None => false,
    }
}

fn read_tar_gz(archive: &Path) -> std::io::Result<()> {
    let mut tar = Archive::new(GzDecoder::new(File::open(archive)?));
    for entry in tar.entries()? {
        std::io::copy(&mut entry?, &mut std::io::sink())?;
    }
    Ok(())
}

fn unpack_tar_gz(archive: &Path, dest: &Path, log: &Log) -> Result<()> {
    let file = File::open(archive).map_err(|e| ProvisionError::fs("failed to open", archive, e))?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_overwrite(true);
    tar.set_preserve_permissions(true);

    let entries = tar
        .entries()
        .map_err(|e| ProvisionError::fs("failed to read", archive, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| ProvisionError::fs("failed to read entry in", archive, e))?;
        // unpack_in refuses entries that would land outside `dest`
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| ProvisionError::fs("failed to unpack", archive, e))?;
        if !unpacked {
            let name = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            log.warn(format!("Skipped archive entry outside destination: {name}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tar_gz, MockRunner};
    use crate::util::process::CommandOutput;
    use tempfile::TempDir;

    #[test]
    fn test_detect() {
        assert_eq!(ArchiveKind::detect(Path::new("opencv-4.4.0.zip")), Some(ArchiveKind::Zip));
        assert_eq!(
            ArchiveKind::detect(Path::new("/w/opencv-4.4.0.tar.gz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(ArchiveKind::detect(Path::new("x.TGZ")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect(Path::new("install_status.json")), None);
        assert_eq!(ArchiveKind::detect(Path::new("opencv-4.4.0")), None);
    }

    #[test]
    fn test_unpacks_tar_gz_in_process() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("opencv-4.4.0.tar.gz");
        std::fs::write(
            &archive,
            tar_gz(&[("opencv-4.4.0/CMakeLists.txt", "project(OpenCV)\n")]),
        )
        .unwrap();

        let runner = MockRunner::new();
        extract(&archive, tmp.path(), &runner, &Log::default()).unwrap();

        let cmake = std::fs::read_to_string(tmp.path().join("opencv-4.4.0/CMakeLists.txt")).unwrap();
        assert_eq!(cmake, "project(OpenCV)\n");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_zip_goes_through_unzip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("opencv-4.4.0.zip");
        std::fs::write(&archive, b"PK").unwrap();

        let runner = MockRunner::new();
        runner.expect_prefix("unzip -q -o", CommandOutput::success(""));
        extract(&archive, tmp.path(), &runner, &Log::default()).unwrap();

        let calls = runner.commands();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get_cwd(), Some(tmp.path()));
        assert!(calls[0].display_command().ends_with("opencv-4.4.0.zip"));
    }

    #[test]
    fn test_unzip_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("broken.zip");
        std::fs::write(&archive, b"").unwrap();

        let runner = MockRunner::new();
        runner.expect_prefix("unzip", CommandOutput::failure(9, "End-of-central-directory signature not found"));
        let err = extract(&archive, tmp.path(), &runner, &Log::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::CommandFailed { .. }));
        assert!(err.to_string().contains("End-of-central-directory"));
    }

    #[test]
    fn test_intact_archives() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.tar.gz");
        std::fs::write(&good, tar_gz(&[("a/b.txt", "hello")])).unwrap();
        let mut truncated = tar_gz(&[("a/b.txt", &"x".repeat(4096))]);
        truncated.truncate(truncated.len() / 2);
        let bad = tmp.path().join("bad.tar.gz");
        std::fs::write(&bad, truncated).unwrap();

        let runner = MockRunner::new();
        assert!(is_intact(&good, &runner));
        assert!(!is_intact(&bad, &runner));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_zip_integrity_uses_unzip_test() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("opencv-4.5.4.zip");
        std::fs::write(&archive, b"PK").unwrap();

        let runner = MockRunner::new();
        runner.expect_prefix("unzip -tq", CommandOutput::failure(2, "End-of-central-directory signature not found"));
        assert!(!is_intact(&archive, &runner));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_corrupt_tarball_fails() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("opencv-4.4.0.tar.gz");
        std::fs::write(&archive, b"not gzip at all").unwrap();

        let result = extract(&archive, tmp.path(), &MockRunner::new(), &Log::default());
        assert!(matches!(result, Err(ProvisionError::Filesystem { .. })));
    }
}
