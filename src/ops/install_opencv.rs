//! Implementation of `jetbuild --install-opencv`.
//!
//! OpenCV is built from source in six stages:
//!
//! ```text
//! dependencies-installed -> source-downloaded -> source-extracted
//!     -> build-configured -> build-compiled -> build-installed
//! ```
//!
//! Each stage is skipped when the ledger already records it, and the ledger
//! is written as soon as a stage succeeds. A failed stage leaves the ledger
//! untouched, so the next run starts again at exactly that stage. The one
//! exception is an archive that fails to extract and does not read back:
//! it is deleted and the download stage reopened.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::builder::{self, CMakeBuild};
use crate::core::arch;
use crate::core::component::OPENCV_DEPENDENCIES;
use crate::core::{BuildWorkspace, ComponentDescriptor, ComponentVersion};
use crate::errors::{ProvisionError, Result};
use crate::net::{Fetch, TransferRequest};
use crate::ops::apt::PackageManager;
use crate::ops::ledger::{Stage, StageLedger};
use crate::util::fs::{copy_file, remove_file_if_exists};
use crate::util::log::Log;
use crate::util::process::ProcessRunner;
use crate::util::GlobalContext;

/// Interpreter handed to CMake when the config names none.
pub const DEFAULT_PYTHON_EXECUTABLE: &str = "/usr/bin/python3";

/// Options for the OpenCV install.
#[derive(Debug, Clone)]
pub struct InstallOpencvOptions {
    /// Release to build
    pub version: ComponentVersion,

    /// Parallel compile jobs (None = CPU count)
    pub jobs: Option<usize>,

    pub python_executable: String,

    /// CMake options layered over the defaults
    pub extra_options: BTreeMap<String, String>,

    /// Prefix apt and install commands with sudo
    pub sudo: bool,

    /// File holding the board model string
    pub device_model_path: PathBuf,

    /// Check that cmake and make are on PATH before configuring
    pub check_tools: bool,
}

impl InstallOpencvOptions {
    /// Options for `version` taken from the context's configuration.
    pub fn from_context(ctx: &GlobalContext, version: ComponentVersion) -> Self {
        let config = ctx.config();
        InstallOpencvOptions {
            version,
            jobs: config.build.jobs,
            python_executable: config
                .build
                .python_executable
                .clone()
                .unwrap_or_else(|| DEFAULT_PYTHON_EXECUTABLE.to_string()),
            extra_options: config.build.options.clone(),
            sudo: config.system.sudo(),
            device_model_path: config.system.device_model_path(),
            check_tools: true,
        }
    }
}

/// Which stages a run performed and which it found already done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub executed: Vec<Stage>,
    pub skipped: Vec<Stage>,
}

impl PipelineReport {
    /// True when every stage was already complete.
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Drives the six-stage OpenCV pipeline for one work directory.
pub struct OpencvInstaller<'a> {
    work_dir: PathBuf,
    component: ComponentDescriptor,
    options: InstallOpencvOptions,
    runner: &'a dyn ProcessRunner,
    fetcher: &'a dyn Fetch,
    log: Log,
    ledger: StageLedger,
    workspace: BuildWorkspace,
}

impl<'a> OpencvInstaller<'a> {
    pub fn new(
        ctx: &GlobalContext,
        options: InstallOpencvOptions,
        runner: &'a dyn ProcessRunner,
        fetcher: &'a dyn Fetch,
    ) -> Result<Self> {
        let log = ctx.log().clone();
        let component =
            ComponentDescriptor::opencv(options.version).with_options(&options.extra_options);
        let workspace = BuildWorkspace::new(ctx.work_dir(), &component)?;
        let ledger = StageLedger::for_component(ctx.ledger_path(), &component.dir_name(), &log);

        Ok(OpencvInstaller {
            work_dir: ctx.work_dir().to_path_buf(),
            component,
            options,
            runner,
            fetcher,
            log,
            ledger,
            workspace,
        })
    }

    /// Swap the component, e.g. to download from a mirror. The workspace
    /// and ledger are rebound to the new component.
    pub fn with_component(mut self, component: ComponentDescriptor) -> Result<Self> {
        self.workspace = BuildWorkspace::new(&self.work_dir, &component)?;
        let path = self.ledger.path().to_path_buf();
        self.ledger = StageLedger::for_component(path, &component.dir_name(), &self.log);
        self.component = component;
        Ok(self)
    }

    /// Run every stage not yet recorded, stopping at the first failure.
    pub fn run(&mut self) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();

        for stage in Stage::ALL {
            if self.ledger.is_complete(stage) {
                self.log.info(format!("Stage {stage} already complete, skipping"));
                report.skipped.push(stage);
                continue;
            }

            self.log.info(format!("Running stage {stage}"));
            self.run_stage(stage)
                .and_then(|()| self.ledger.complete(stage))
                .map_err(|e| e.in_stage(stage))?;
            report.executed.push(stage);
        }

        if report.is_noop() {
            self.log.info(format!("OpenCV {} already installed", self.component.version()));
        } else {
            self.log.info(format!("OpenCV {} installation successful", self.component.version()));
        }
        Ok(report)
    }

    fn run_stage(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::DependenciesInstalled => self.install_dependencies(),
            Stage::SourceDownloaded => self.download(),
            Stage::SourceExtracted => self.extract(),
            Stage::BuildConfigured => self.configure(),
            Stage::BuildCompiled => self.compile(),
            Stage::BuildInstalled => self.install(),
        }
    }

    fn install_dependencies(&self) -> Result<()> {
        let apt = PackageManager::new(self.runner, self.options.sudo, self.log.clone());
        for packages in OPENCV_DEPENDENCIES {
            apt.install_with_repair(packages)?;
        }
        Ok(())
    }

    fn download(&self) -> Result<()> {
        if self.copy_prestaged()? {
            return Ok(());
        }

        let version = self.component.version().to_string();
        let dir = self.workspace.component_dir();
        let (main_name, contrib_name) = self.component.archive_names();
        let requests = [
            TransferRequest::new("OpenCV", &version, self.component.main_url(), dir.join(main_name))?,
            TransferRequest::new(
                "OpenCV-Contrib",
                &version,
                self.component.contrib_url(),
                dir.join(contrib_name),
            )?,
        ];

        for request in &requests {
            let outcome = self.fetcher.fetch(request);
            if !outcome.success {
                return Err(ProvisionError::TransferFailed {
                    artifact: request.name.clone(),
                    message: outcome.message,
                });
            }
            self.log.info(format!("{}: {}", request.label(), outcome.message));
        }
        Ok(())
    }

    /// Use tarballs dropped into the work directory instead of downloading.
    /// Returns false when there are none for this version.
    fn copy_prestaged(&self) -> Result<bool> {
        let Some((main, contrib)) = self.component.prestaged_archives() else {
            return Ok(false);
        };
        let sources = [self.work_dir.join(&main), self.work_dir.join(&contrib)];
        if !sources.iter().all(|p| p.is_file()) {
            return Ok(false);
        }

        self.log.info(format!(
            "Using local OpenCV {} archives from {}",
            self.component.version(),
            self.work_dir.display()
        ));
        for (src, name) in sources.iter().zip([main, contrib]) {
            copy_file(src, &self.workspace.component_dir().join(name))?;
        }
        Ok(true)
    }

    fn extract(&mut self) -> Result<()> {
        let archives = self.workspace.archives()?;
        if archives.is_empty() {
            return Err(ProvisionError::InvalidInput(format!(
                "no archives to extract in {}",
                self.workspace.component_dir().display()
            )));
        }

        let dest = self.workspace.component_dir().to_path_buf();
        for archive in &archives {
            if let Err(e) = builder::extract(archive, &dest, self.runner, &self.log) {
                if !builder::is_intact(archive, self.runner) {
                    self.discard_archive(archive)?;
                }
                return Err(e);
            }
        }

        let source = self.workspace.discover_source_dir(&self.component)?;
        self.log.info(format!("OpenCV sources at {}", source.display()));
        Ok(())
    }

    /// Drop an unreadable archive and reopen the download stage so the next
    /// run fetches it again.
    fn discard_archive(&mut self, archive: &Path) -> Result<()> {
        self.log.warn(format!(
            "Removing unreadable archive {}; it will be downloaded again",
            archive.display()
        ));
        remove_file_if_exists(archive)
            .map_err(|e| ProvisionError::fs("failed to remove", archive, e))?;
        self.ledger.reopen(Stage::SourceDownloaded)
    }

    /// The build directory, re-deriving the source tree when extraction
    /// finished in an earlier run.
    fn build_dir(&mut self) -> Result<PathBuf> {
        if self.workspace.source_dir().is_none() {
            self.workspace.resume_source_dir(&self.component)?;
        }
        self.workspace.build_dir()
    }

    fn cmake(&self, build_dir: &Path) -> CMakeBuild<'a> {
        CMakeBuild::new(self.runner, build_dir).sudo(self.options.sudo)
    }

    fn configure(&mut self) -> Result<()> {
        if self.options.check_tools {
            builder::preflight()?;
        }

        let (cuda_arch, reason) = arch::probe(&self.options.device_model_path);
        self.log.info(reason);

        let build_dir = self.build_dir()?;
        let extra_modules = self.workspace.contrib_modules_dir(&self.component);
        let derived = [
            (
                "OPENCV_EXTRA_MODULES_PATH".to_string(),
                extra_modules.display().to_string(),
            ),
            (
                "PYTHON_EXECUTABLE".to_string(),
                self.options.python_executable.clone(),
            ),
            ("CUDA_ARCH_BIN".to_string(), cuda_arch.to_string()),
        ];

        // Configured options are applied last so they can override the
        // derived ones.
        self.cmake(&build_dir)
            .options(derived)
            .options(self.component.options().clone())
            .configure()
    }

    fn compile(&mut self) -> Result<()> {
        let build_dir = self.build_dir()?;
        let jobs = builder::resolve_jobs(self.options.jobs);
        self.log.info(format!("Compiling with {jobs} jobs in {}", build_dir.display()));
        self.cmake(&build_dir).compile(jobs)
    }

    fn install(&mut self) -> Result<()> {
        let build_dir = self.build_dir()?;
        self.cmake(&build_dir).install()
    }
}

/// Build and install OpenCV `options.version`, resuming from the ledger.
pub fn install_opencv(
    ctx: &GlobalContext,
    options: InstallOpencvOptions,
    runner: &dyn ProcessRunner,
    fetcher: &dyn Fetch,
) -> Result<PipelineReport> {
    OpencvInstaller::new(ctx, options, runner, fetcher)?.run()
}
