//! Build workspace - where a component's archives, sources and build tree
//! live on disk.

use std::io;
use std::path::{Path, PathBuf};

use crate::builder::extract::ArchiveKind;
use crate::core::component::ComponentDescriptor;
use crate::errors::{ProvisionError, Result};
use crate::util::fs::ensure_dir;

/// Filesystem layout of one component build.
///
/// ```text
/// <root>/
///   opencv-4.4.0/                  component dir (archives land here)
///     opencv-4.4.0/                source dir
///       build/                     build dir
///     opencv_contrib-4.4.0/
/// ```
#[derive(Debug)]
pub struct BuildWorkspace {
    component_dir: PathBuf,
    source_dir: Option<PathBuf>,
    build_dir: Option<PathBuf>,
}

impl BuildWorkspace {
    /// Lay out a workspace for `component` under `root`, creating the
    /// component directory.
    pub fn new(root: &Path, component: &ComponentDescriptor) -> Result<Self> {
        let component_dir = root.join(component.dir_name());
        ensure_dir(&component_dir)?;

        Ok(BuildWorkspace {
            component_dir,
            source_dir: None,
            build_dir: None,
        })
    }

    pub fn component_dir(&self) -> &Path {
        &self.component_dir
    }

    /// Where the contrib modules are expected after extraction.
    pub fn contrib_modules_dir(&self, component: &ComponentDescriptor) -> PathBuf {
        self.component_dir
            .join(component.contrib_dir_name())
            .join("modules")
    }

    /// Archive files in the component directory, sorted by name.
    pub fn archives(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.component_dir)
            .map_err(|e| ProvisionError::fs("failed to read", &self.component_dir, e))?;

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ProvisionError::fs("failed to read", &self.component_dir, e))?;
            let path = entry.path();
            if path.is_file() && ArchiveKind::detect(&path).is_some() {
                archives.push(path);
            }
        }
        archives.sort();
        Ok(archives)
    }

    /// Find the primary source tree after extraction.
    ///
    /// The directory named after the component version is preferred. Only
    /// when it is absent are the extracted directories scanned, taking the
    /// first one named after the component that is not the contrib module.
    pub fn discover_source_dir(&mut self, component: &ComponentDescriptor) -> Result<&Path> {
        let expected = self.component_dir.join(component.source_dir_name());
        let found = if expected.is_dir() {
            Some(expected)
        } else {
            self.scan_for_source_dir(component)?
        };

        match found {
            Some(dir) => Ok(self.source_dir.insert(dir).as_path()),
            None => Err(ProvisionError::fs(
                "no extracted source directory in",
                &self.component_dir,
                io::Error::from(io::ErrorKind::NotFound),
            )),
        }
    }

    fn scan_for_source_dir(&self, component: &ComponentDescriptor) -> Result<Option<PathBuf>> {
        let entries = std::fs::read_dir(&self.component_dir)
            .map_err(|e| ProvisionError::fs("failed to read", &self.component_dir, e))?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(component.name()) && !ComponentDescriptor::is_auxiliary(n))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();
        Ok(candidates.into_iter().next())
    }

    /// Re-derive the source tree of an extraction finished in an earlier
    /// run. No scanning: the directory must be where the version says.
    pub fn resume_source_dir(&mut self, component: &ComponentDescriptor) -> Result<&Path> {
        let expected = self.component_dir.join(component.source_dir_name());
        if !expected.is_dir() {
            return Err(ProvisionError::fs(
                "source directory not found",
                expected,
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        Ok(self.source_dir.insert(expected).as_path())
    }

    /// The source tree recorded for this run, if any.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// `<source>/build`, created on first use.
    pub fn build_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.build_dir {
            return Ok(dir.clone());
        }

        let source = self.source_dir.as_ref().ok_or_else(|| {
            ProvisionError::fs(
                "source directory not resolved for",
                &self.component_dir,
                io::Error::from(io::ErrorKind::NotFound),
            )
        })?;
        let dir = source.join("build");
        ensure_dir(&dir)?;
        Ok(self.build_dir.insert(dir).clone())
    }
}
