//! Implementation of `jetbuild --install-cuda`.
//!
//! Installs the CUDA toolchain and the NVIDIA inference libraries from the
//! JetPack apt repository, exports the CUDA paths from the user's shell rc
//! file and checks that each component is usable.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::errors::{ProvisionError, Result};
use crate::ops::apt::PackageManager;
use crate::util::process::{ProcessBuilder, ProcessRunner};
use crate::util::GlobalContext;

/// Package groups installed in order, one `apt-get install` each.
pub const CUDA_PACKAGES: &[&[&str]] = &[
    &["cuda"],
    &["libcudnn8", "libcudnn8-dev"],
    &["tensorrt"],
    &["libnvvpi2"],
];

/// Lines added to the shell rc file so new shells find the toolchain.
pub const CUDA_ENV_LINES: &[&str] = &[
    "export PATH=/usr/local/cuda/bin:$PATH",
    "export LD_LIBRARY_PATH=/usr/local/cuda/lib64:$LD_LIBRARY_PATH",
];

const NVCC: &str = "/usr/local/cuda/bin/nvcc";

/// Verification result for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentCheck {
    pub component: &'static str,
    pub installed: bool,
    /// Version line or package row found, or why nothing was
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CudaReport {
    pub checks: Vec<ComponentCheck>,
}

impl CudaReport {
    pub fn all_installed(&self) -> bool {
        self.checks.iter().all(|c| c.installed)
    }

    /// Components that did not verify.
    pub fn missing(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|c| !c.installed)
            .map(|c| c.component)
            .collect()
    }
}

/// Install the CUDA stack and report what verified.
///
/// Package installation failures abort immediately. Verification failures
/// do not; they are listed in the returned report.
pub fn install_cuda(ctx: &GlobalContext, runner: &dyn ProcessRunner) -> Result<CudaReport> {
    let log = ctx.log();
    let apt = PackageManager::new(runner, ctx.config().system.sudo(), log.clone());

    log.info("Installing CUDA toolchain and libraries");
    apt.update()?;
    for packages in CUDA_PACKAGES {
        apt.install(packages)?;
    }

    match ctx.shell_rc() {
        Some(rc) => {
            let added = append_missing_lines(&rc, CUDA_ENV_LINES)?;
            if added == 0 {
                log.verbose(format!("CUDA environment already set in {}", rc.display()));
            } else {
                log.info(format!(
                    "Added CUDA environment to {}; open a new shell to pick it up",
                    rc.display()
                ));
            }
        }
        None => log.warn("No shell rc file found; add /usr/local/cuda/bin to PATH manually"),
    }

    let report = verify_cuda(runner);
    for check in &report.checks {
        if check.installed {
            log.info(format!("{}: {}", check.component, check.detail));
        } else {
            log.error(format!("{}: {}", check.component, check.detail));
        }
    }
    Ok(report)
}

/// Check that nvcc runs and that cuDNN and TensorRT are registered
/// with dpkg.
pub fn verify_cuda(runner: &dyn ProcessRunner) -> CudaReport {
    let nvcc = if Path::new(NVCC).exists() { NVCC } else { "nvcc" };
    let out = runner.run(&ProcessBuilder::new(nvcc).arg("--version"));
    let cuda = ComponentCheck {
        component: "cuda",
        installed: out.success,
        detail: if out.success {
            out.output
                .lines()
                .find(|l| l.contains("release"))
                .unwrap_or("Installed")
                .trim()
                .to_string()
        } else {
            "nvcc not runnable".to_string()
        },
    };

    let dpkg = runner.run(&ProcessBuilder::new("dpkg").arg("-l"));
    let package_check = |component: &'static str| {
        let row = dpkg
            .success
            .then(|| {
                dpkg.output
                    .lines()
                    .find(|l| l.starts_with("ii") && l.to_lowercase().contains(component))
            })
            .flatten();
        ComponentCheck {
            component,
            installed: row.is_some(),
            detail: match row {
                Some(row) => row.split_whitespace().skip(1).take(2).collect::<Vec<_>>().join(" "),
                None => "Not installed".to_string(),
            },
        }
    };

    CudaReport {
        checks: vec![cuda, package_check("cudnn"), package_check("tensorrt")],
    }
}

/// Append each of `lines` not already present in `path`, creating the
/// file if needed. Returns how many lines were added.
pub fn append_missing_lines(path: &Path, lines: &[&str]) -> Result<usize> {
    let existing = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ProvisionError::fs("failed to read", path, e)),
    };

    let missing: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| !existing.lines().any(|l| l.trim() == *line))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let mut text = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        text.push('\n');
    }
    for line in &missing {
        text.push_str(line);
        text.push('\n');
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(text.as_bytes()))
        .map_err(|e| ProvisionError::fs("failed to append to", path, e))?;
    Ok(missing.len())
}
