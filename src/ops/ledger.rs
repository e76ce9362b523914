//! Stage ledger - which install stages have finished.
//!
//! The ledger is a flat JSON object of stage flags stored in the work
//! directory. It is flushed after every completed stage, so an interrupted
//! run loses at most the stage that was in flight.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ProvisionError, Result};
use crate::util::fs::write_atomic;
use crate::util::log::Log;

/// One resumable unit of the install pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    DependenciesInstalled,
    SourceDownloaded,
    SourceExtracted,
    BuildConfigured,
    BuildCompiled,
    BuildInstalled,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::DependenciesInstalled,
        Stage::SourceDownloaded,
        Stage::SourceExtracted,
        Stage::BuildConfigured,
        Stage::BuildCompiled,
        Stage::BuildInstalled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DependenciesInstalled => "dependencies-installed",
            Stage::SourceDownloaded => "source-downloaded",
            Stage::SourceExtracted => "source-extracted",
            Stage::BuildConfigured => "build-configured",
            Stage::BuildCompiled => "build-compiled",
            Stage::BuildInstalled => "build-installed",
        }
    }

    /// Stages that must be complete before this one may be.
    pub fn predecessors(self) -> impl Iterator<Item = Stage> {
        Stage::ALL.into_iter().take_while(move |s| *s != self)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted completion flags.
///
/// Missing fields decode as `false` and unknown fields are ignored. The
/// field names of the older `opencv_*` layout are accepted on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageRecord {
    /// Build the flags belong to, e.g. `opencv-4.4.0`. Absent in files
    /// written before builds were named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub dependencies_installed: bool,
    #[serde(alias = "opencv_downloaded")]
    pub source_downloaded: bool,
    #[serde(alias = "opencv_extracted")]
    pub source_extracted: bool,
    #[serde(alias = "opencv_configured")]
    pub build_configured: bool,
    #[serde(alias = "opencv_compiled")]
    pub build_compiled: bool,
    #[serde(alias = "opencv_installed")]
    pub build_installed: bool,
}

impl StageRecord {
    pub fn is_complete(&self, stage: Stage) -> bool {
        match stage {
            Stage::DependenciesInstalled => self.dependencies_installed,
            Stage::SourceDownloaded => self.source_downloaded,
            Stage::SourceExtracted => self.source_extracted,
            Stage::BuildConfigured => self.build_configured,
            Stage::BuildCompiled => self.build_compiled,
            Stage::BuildInstalled => self.build_installed,
        }
    }

    fn flag_mut(&mut self, stage: Stage) -> &mut bool {
        match stage {
            Stage::DependenciesInstalled => &mut self.dependencies_installed,
            Stage::SourceDownloaded => &mut self.source_downloaded,
            Stage::SourceExtracted => &mut self.source_extracted,
            Stage::BuildConfigured => &mut self.build_configured,
            Stage::BuildCompiled => &mut self.build_compiled,
            Stage::BuildInstalled => &mut self.build_installed,
        }
    }

    /// The earliest stage still to run, `None` once everything is done.
    pub fn first_incomplete(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| !self.is_complete(*s))
    }

    /// Whether every completed stage has all its predecessors completed.
    pub fn is_ordered(&self) -> bool {
        match self.first_incomplete() {
            Some(gap) => Stage::ALL
                .into_iter()
                .filter(|s| *s > gap)
                .all(|s| !self.is_complete(s)),
            None => true,
        }
    }

    /// Clear every flag after the first incomplete stage. Returns the
    /// stages that were cleared.
    pub fn normalize(&mut self) -> Vec<Stage> {
        let Some(gap) = self.first_incomplete() else {
            return Vec::new();
        };

        let mut cleared = Vec::new();
        for stage in Stage::ALL.into_iter().filter(|s| *s > gap) {
            let flag = self.flag_mut(stage);
            if *flag {
                *flag = false;
                cleared.push(stage);
            }
        }
        cleared
    }

    /// Read the record at `path`.
    ///
    /// A missing file is a fresh start. An unreadable or corrupt file is
    /// logged and also treated as a fresh start: re-running stages is safe,
    /// refusing to run is not useful.
    pub fn load(path: &Path, log: &Log) -> StageRecord {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return StageRecord::default(),
            Err(e) => {
                log.warn(format!(
                    "Cannot read install status {}: {e}; starting from scratch",
                    path.display()
                ));
                return StageRecord::default();
            }
        };

        let mut record: StageRecord = match serde_json::from_slice(&content) {
            Ok(record) => record,
            Err(e) => {
                log.warn(format!(
                    "Ignoring corrupt install status {}: {e}",
                    path.display()
                ));
                return StageRecord::default();
            }
        };

        let cleared = record.normalize();
        if !cleared.is_empty() {
            let names: Vec<_> = cleared.iter().map(Stage::as_str).collect();
            log.warn(format!(
                "Install status marks {} complete out of order; they will run again",
                names.join(", ")
            ));
        }
        record
    }

    /// Atomically replace the record at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ProvisionError::fs("failed to serialize", path, io::Error::other(e)))?;
        write_atomic(path, &json)
    }
}

/// A [`StageRecord`] bound to its file, flushed on every change.
#[derive(Debug)]
pub struct StageLedger {
    path: PathBuf,
    record: StageRecord,
}

impl StageLedger {
    /// Load the ledger at `path`, see [`StageRecord::load`].
    pub fn load(path: impl Into<PathBuf>, log: &Log) -> Self {
        let path = path.into();
        let record = StageRecord::load(&path, log);
        StageLedger { path, record }
    }

    /// Load the ledger at `path` for the build named `component`.
    ///
    /// Flags recorded for a different build do not count: the ledger starts
    /// from scratch and the old file is replaced on the first completed
    /// stage. An unnamed record is adopted.
    pub fn for_component(path: impl Into<PathBuf>, component: &str, log: &Log) -> Self {
        let mut ledger = StageLedger::load(path, log);
        if let Some(owner) = ledger.record.component.as_deref() {
            if owner != component {
                log.warn(format!(
                    "Install status {} records {owner}, not {component}; starting from scratch",
                    ledger.path().display()
                ));
                ledger.record = StageRecord::default();
            }
        }
        ledger.record.component = Some(component.to_string());
        ledger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &StageRecord {
        &self.record
    }

    pub fn is_complete(&self, stage: Stage) -> bool {
        self.record.is_complete(stage)
    }

    /// Mark `stage` complete and persist.
    ///
    /// Refuses to mark a stage whose predecessors are not complete. If the
    /// write fails the in-memory record is left unchanged and the error is
    /// returned.
    pub fn complete(&mut self, stage: Stage) -> Result<()> {
        if let Some(missing) = stage.predecessors().find(|s| !self.record.is_complete(*s)) {
            return Err(ProvisionError::InvalidInput(format!(
                "cannot mark `{stage}` complete before `{missing}`"
            )));
        }
        if self.record.is_complete(stage) {
            return Ok(());
        }

        let mut next = self.record.clone();
        *next.flag_mut(stage) = true;
        next.save(&self.path)?;
        self.record = next;
        Ok(())
    }

    /// Mark `stage` and every later stage incomplete and persist, so the
    /// next run starts again at `stage`.
    pub fn reopen(&mut self, stage: Stage) -> Result<()> {
        let mut next = self.record.clone();
        for later in Stage::ALL.into_iter().filter(|s| *s >= stage) {
            *next.flag_mut(later) = false;
        }
        if next == self.record {
            return Ok(());
        }
        next.save(&self.path)?;
        self.record = next;
        Ok(())
    }
}
