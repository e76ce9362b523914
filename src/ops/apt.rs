//! System package manager (apt) commands.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{ProvisionError, Result};
use crate::util::log::Log;
use crate::util::process::{ProcessBuilder, ProcessRunner};

/// Components whose available versions can be listed, and the apt package
/// that carries each.
pub const COMPONENT_PACKAGES: &[(&str, &str)] = &[
    ("cuda", "cuda"),
    ("cudnn", "libcudnn8"),
    ("tensorrt", "tensorrt"),
    ("libnvinfer", "libnvinfer8"),
    ("libnvvpi", "libnvvpi2"),
];

/// The apt package for a catalog component.
pub fn package_for(component: &str) -> Result<&'static str> {
    COMPONENT_PACKAGES
        .iter()
        .find(|(name, _)| *name == component)
        .map(|(_, package)| *package)
        .ok_or_else(|| {
            let known: Vec<_> = COMPONENT_PACKAGES.iter().map(|(name, _)| *name).collect();
            ProvisionError::InvalidInput(format!(
                "unknown component `{component}`; expected one of: {}",
                known.join(", ")
            ))
        })
}

/// apt-get and apt-cache invocations over a [`ProcessRunner`].
pub struct PackageManager<'a> {
    runner: &'a dyn ProcessRunner,
    sudo: bool,
    log: Log,
}

impl<'a> PackageManager<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, sudo: bool, log: Log) -> Self {
        PackageManager { runner, sudo, log }
    }

    pub fn update_command(&self) -> ProcessBuilder {
        ProcessBuilder::privileged("apt-get", self.sudo).arg("update")
    }

    pub fn install_command(&self, packages: &[&str]) -> ProcessBuilder {
        ProcessBuilder::privileged("apt-get", self.sudo)
            .args(["install", "-y"])
            .args(packages)
    }

    pub fn repair_command(&self) -> ProcessBuilder {
        ProcessBuilder::privileged("apt", self.sudo).args(["--fix-broken", "install", "-y"])
    }

    pub fn policy_command(&self, package: &str) -> ProcessBuilder {
        ProcessBuilder::new("apt-cache").args(["policy", package])
    }

    pub fn update(&self) -> Result<()> {
        self.runner.run_checked(&self.update_command())?;
        Ok(())
    }

    pub fn install(&self, packages: &[&str]) -> Result<()> {
        self.runner.run_checked(&self.install_command(packages))?;
        Ok(())
    }

    /// Install `packages`; on failure run `apt --fix-broken install` once
    /// and retry the install exactly once more.
    ///
    /// The repair itself is best-effort: its failure is logged and the
    /// retry still happens, since the retry's result is what counts.
    pub fn install_with_repair(&self, packages: &[&str]) -> Result<()> {
        let cmd = self.install_command(packages);
        let first = self.runner.run(&cmd);
        if first.success {
            return Ok(());
        }

        self.log.warn(format!(
            "`{}` failed, attempting to repair broken packages",
            cmd.display_command()
        ));
        let repair = self.runner.run(&self.repair_command());
        if !repair.success {
            self.log.warn(format!("Package repair failed: {}", repair.output.trim()));
        }

        self.runner.run_checked(&cmd)?;
        Ok(())
    }

    /// Versions apt knows for `package`, see [`parse_policy`].
    pub fn policy(&self, package: &str) -> Result<Vec<String>> {
        let out = self.runner.run_checked(&self.policy_command(package))?;
        Ok(parse_policy(&out.output))
    }
}

fn version_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "     8.6.0.166-1+cuda11.4 500" or " *** 8.2.1.32-1+cuda10.2 100"
    RE.get_or_init(|| Regex::new(r"^\s*(?:\*\*\*\s+)?(\S+)\s+-?\d+\s*$").expect("static pattern"))
}

/// Parse `apt-cache policy` output into upstream versions.
///
/// The candidate comes first, then every entry of the version table,
/// newest first. Epochs and Debian revisions are dropped and duplicates
/// removed. A `(none)` candidate is skipped.
pub fn parse_policy(text: &str) -> Vec<String> {
    let mut candidate = None;
    let mut table = Vec::new();
    let mut in_table = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Candidate:") {
            let rest = rest.trim();
            if !rest.is_empty() && rest != "(none)" {
                candidate = Some(upstream_version(rest).to_string());
            }
            continue;
        }
        if trimmed.starts_with("Version table:") {
            in_table = true;
            continue;
        }
        if in_table {
            if let Some(caps) = version_line().captures(line) {
                table.push(upstream_version(&caps[1]).to_string());
            }
        }
    }

    table.sort_by(|a, b| compare_versions(b, a));

    let mut versions: Vec<String> = Vec::new();
    for v in candidate.into_iter().chain(table) {
        if !versions.contains(&v) {
            versions.push(v);
        }
    }
    versions
}

/// Strip an `epoch:` prefix and a `-revision` suffix.
fn upstream_version(full: &str) -> &str {
    let without_epoch = match full.split_once(':') {
        Some((epoch, rest)) if epoch.bytes().all(|b| b.is_ascii_digit()) => rest,
        _ => full,
    };
    match without_epoch.rsplit_once('-') {
        Some((upstream, _)) if !upstream.is_empty() => upstream,
        _ => without_epoch,
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment<'a> {
    Num(u64),
    Text(&'a str),
}

fn segments(v: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = v;
    while let Some(first) = rest.chars().next() {
        let numeric = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != numeric)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        out.push(if numeric {
            Segment::Num(run.parse().unwrap_or(u64::MAX))
        } else {
            Segment::Text(run)
        });
        rest = tail;
    }
    out
}

/// Compare versions run by run, numbers numerically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    segments(a).cmp(&segments(b))
}
