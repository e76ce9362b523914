//! Configuration file support for jetbuild.
//!
//! Two configuration file locations are consulted:
//! - Global: `~/.jetbuild/config.toml` - User-wide defaults
//! - Project: `<work_dir>/config.toml` - Overrides for one work directory
//!
//! Project config takes precedence over global config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::net::{RetryPolicy, TransferConfig};

/// jetbuild configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network settings
    pub net: NetConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Host settings
    pub system: SystemConfig,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Total transfer attempts per artifact
    pub max_attempts: Option<u32>,

    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: Option<u64>,

    /// Read size for streaming and hashing
    pub chunk_size: Option<usize>,

    /// User-Agent header sent with every request
    pub user_agent: Option<String>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Parallel compile jobs (None = CPU count)
    pub jobs: Option<usize>,

    /// Python interpreter handed to CMake
    pub python_executable: Option<String>,

    /// Extra or overriding CMake options
    pub options: BTreeMap<String, String>,
}

/// Host-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Prefix privileged commands with sudo (default: true)
    pub sudo: Option<bool>,

    /// File holding the board's model string
    pub device_model_path: Option<PathBuf>,

    /// Shell rc file receiving CUDA environment exports
    pub shell_rc: Option<PathBuf>,
}

/// Where the kernel exposes the board model.
pub const DEFAULT_DEVICE_MODEL_PATH: &str = "/proc/device-tree/model";

impl SystemConfig {
    pub fn sudo(&self) -> bool {
        self.sudo.unwrap_or(true)
    }

    pub fn device_model_path(&self) -> PathBuf {
        self.device_model_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE_MODEL_PATH))
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Net settings
        if other.net.timeout_secs.is_some() {
            self.net.timeout_secs = other.net.timeout_secs;
        }
        if other.net.max_attempts.is_some() {
            self.net.max_attempts = other.net.max_attempts;
        }
        if other.net.base_delay_ms.is_some() {
            self.net.base_delay_ms = other.net.base_delay_ms;
        }
        if other.net.chunk_size.is_some() {
            self.net.chunk_size = other.net.chunk_size;
        }
        if other.net.user_agent.is_some() {
            self.net.user_agent = other.net.user_agent;
        }

        // Build settings
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.python_executable.is_some() {
            self.build.python_executable = other.build.python_executable;
        }
        self.build.options.extend(other.build.options);

        // System settings
        if other.system.sudo.is_some() {
            self.system.sudo = other.system.sudo;
        }
        if other.system.device_model_path.is_some() {
            self.system.device_model_path = other.system.device_model_path;
        }
        if other.system.shell_rc.is_some() {
            self.system.shell_rc = other.system.shell_rc;
        }
    }

    /// Transfer engine settings with defaults filled in.
    pub fn transfer_config(&self) -> TransferConfig {
        let defaults = TransferConfig::default();
        TransferConfig {
            timeout: self
                .net
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry: RetryPolicy {
                max_attempts: self.net.max_attempts.unwrap_or(defaults.retry.max_attempts),
                base_delay: self
                    .net
                    .base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_delay),
            },
            chunk_size: self.net.chunk_size.unwrap_or(defaults.chunk_size),
            user_agent: self.net.user_agent.clone().unwrap_or(defaults.user_agent),
            show_progress: defaults.show_progress,
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (<work_dir>/config.toml)
/// 2. Global config (~/.jetbuild/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global jetbuild directory (~/.jetbuild).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".jetbuild"))
}

/// Get the global config path (~/.jetbuild/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}
