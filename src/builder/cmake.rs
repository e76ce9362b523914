//! CMake driver for the component build tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{ProvisionError, Result};
use crate::util::process::{find_executable, ProcessBuilder, ProcessRunner};

/// Parallelism used when neither the config nor the OS says otherwise.
pub const FALLBACK_JOBS: usize = 4;

/// Tools the configure, compile and install steps shell out to.
const REQUIRED_TOOLS: &[&str] = &["cmake", "make"];

/// Configure, compile and install one CMake source tree with `make`.
///
/// The build directory is a subdirectory of the source tree, so configure
/// points CMake at `..`.
pub struct CMakeBuild<'a> {
    runner: &'a dyn ProcessRunner,
    build_dir: PathBuf,
    options: BTreeMap<String, String>,
    sudo: bool,
}

impl<'a> CMakeBuild<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, build_dir: impl Into<PathBuf>) -> Self {
        CMakeBuild {
            runner,
            build_dir: build_dir.into(),
            options: BTreeMap::new(),
            sudo: true,
        }
    }

    /// Add cache entries; later values win.
    pub fn options<K, V>(mut self, options: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.options
            .extend(options.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Run install steps through `sudo`.
    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn configure_command(&self) -> ProcessBuilder {
        ProcessBuilder::new("cmake")
            .args(self.options.iter().map(|(k, v)| format!("-D{k}={v}")))
            .arg("..")
            .cwd(&self.build_dir)
    }

    pub fn compile_command(&self, jobs: usize) -> ProcessBuilder {
        ProcessBuilder::new("make")
            .arg(format!("-j{}", jobs.max(1)))
            .cwd(&self.build_dir)
    }

    /// `make install` followed by a linker cache refresh.
    pub fn install_commands(&self) -> [ProcessBuilder; 2] {
        [
            ProcessBuilder::privileged("make", self.sudo)
                .arg("install")
                .cwd(&self.build_dir),
            ProcessBuilder::privileged("ldconfig", self.sudo),
        ]
    }

    pub fn configure(&self) -> Result<()> {
        self.runner.run_checked(&self.configure_command())?;
        Ok(())
    }

    pub fn compile(&self, jobs: usize) -> Result<()> {
        self.runner.run_checked(&self.compile_command(jobs))?;
        Ok(())
    }

    /// Install, then refresh the linker cache. Both must succeed.
    pub fn install(&self) -> Result<()> {
        for cmd in self.install_commands() {
            self.runner.run_checked(&cmd)?;
        }
        Ok(())
    }
}

/// Fail early, with something actionable, when a build tool is missing.
pub fn preflight() -> Result<()> {
    let missing: Vec<&str> = REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| find_executable(tool).is_none())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(ProvisionError::InvalidInput(format!(
        "required build tools not found in PATH: {}\n\
         Install them (sudo apt-get install -y cmake build-essential) and try again.",
        missing.join(", ")
    )))
}

/// Parallel compile jobs: the configured value, else the CPU count, else
/// [`FALLBACK_JOBS`].
pub fn resolve_jobs(configured: Option<usize>) -> usize {
    configured
        .filter(|&n| n > 0)
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(FALLBACK_JOBS)
}
