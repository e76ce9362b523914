//! Global context for jetbuild operations.
//!
//! Provides centralized access to the work directory, configuration and the
//! injected logger.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{global_config_dir, global_config_path, load_config, Config};
use crate::util::log::Log;

/// Environment variable overriding the work directory.
pub const WORK_DIR_ENV: &str = "JETBUILD_WORK_DIR";

/// File name of the stage ledger inside the work directory.
pub const LEDGER_FILE: &str = "install_status.json";

/// Everything a command needs to know about where it runs.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    work_dir: PathBuf,
    config: Config,
    log: Log,
}

impl GlobalContext {
    /// Create a context rooted at `work_dir`, or the default work directory.
    ///
    /// The work directory is created if missing and configuration is loaded
    /// from the global and work-directory config files.
    pub fn new(work_dir: Option<PathBuf>) -> Result<Self> {
        let work_dir = match work_dir {
            Some(dir) => dir,
            None => default_work_dir()?,
        };
        let work_dir = std::path::absolute(&work_dir)
            .with_context(|| format!("failed to resolve {}", work_dir.display()))?;
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("failed to create work directory {}", work_dir.display()))?;

        let config = load_config(
            global_config_path().as_deref(),
            &work_dir.join("config.toml"),
        );

        Ok(GlobalContext {
            work_dir,
            config,
            log: Log::tracing(),
        })
    }

    /// Build a context from parts, without touching the disk.
    pub fn with_config(work_dir: PathBuf, config: Config, log: Log) -> Self {
        GlobalContext {
            work_dir,
            config,
            log,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Path of the persisted stage ledger.
    pub fn ledger_path(&self) -> PathBuf {
        self.work_dir.join(LEDGER_FILE)
    }

    /// Shell rc file receiving CUDA environment exports.
    pub fn shell_rc(&self) -> Option<PathBuf> {
        self.config.system.shell_rc.clone().or_else(|| {
            directories::BaseDirs::new().map(|b| b.home_dir().join(".bashrc"))
        })
    }
}

/// Default work directory (~/.jetbuild/work).
pub fn default_work_dir() -> Result<PathBuf> {
    global_config_dir()
        .map(|dir| dir.join("work"))
        .context("could not determine home directory; pass --work-dir")
}
