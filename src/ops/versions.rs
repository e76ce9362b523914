//! Implementation of `jetbuild --list-versions`.

use crate::errors::Result;
use crate::ops::apt::{package_for, PackageManager, COMPONENT_PACKAGES};
use crate::util::log::Log;
use crate::util::process::ProcessRunner;

/// Versions apt offers for one catalog component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersions {
    pub component: String,
    pub package: String,
    /// Candidate first, then newest first
    pub versions: Vec<String>,
}

/// Query apt for `component`, or for every catalog component.
///
/// An unknown component name is an error before anything runs. A failed
/// query only empties that component's list.
pub fn list_versions(
    runner: &dyn ProcessRunner,
    component: Option<&str>,
    log: &Log,
) -> Result<Vec<ComponentVersions>> {
    let selected: Vec<(&str, &str)> = match component {
        Some(name) => vec![(name, package_for(name)?)],
        None => COMPONENT_PACKAGES.to_vec(),
    };

    let apt = PackageManager::new(runner, false, log.clone());
    let mut results = Vec::with_capacity(selected.len());
    for (name, package) in selected {
        let versions = apt.policy(package).unwrap_or_else(|e| {
            log.warn(format!("Failed to get {name} version information: {e}"));
            Vec::new()
        });
        results.push(ComponentVersions {
            component: name.to_string(),
            package: package.to_string(),
            versions,
        });
    }
    Ok(results)
}

/// Render listings the way the CLI prints them. The first version of
/// each component is apt's install candidate when it has one.
pub fn format_versions(listing: &[ComponentVersions]) -> String {
    let mut out = String::from("=== Available Component Versions ===\n");
    for entry in listing {
        out.push_str(&format!("{} ({}):\n", entry.component.to_uppercase(), entry.package));
        if entry.versions.is_empty() {
            out.push_str("  No available versions found\n");
        }
        for v in &entry.versions {
            out.push_str(&format!("  - {v}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProvisionError;
    use crate::test_support::{MemoryLogger, MockRunner};
    use crate::util::log::Level;
    use crate::util::process::CommandOutput;
    use std::sync::Arc;

    #[test]
    fn test_single_component() {
        let runner = MockRunner::new();
        runner.expect(
            "apt-cache policy tensorrt",
            CommandOutput::success(
                "tensorrt:\n  Installed: (none)\n  Candidate: 8.5.2.2-1+cuda11.4\n  Version table:\n     8.5.2.2-1+cuda11.4 500\n     8.4.1.5-1+cuda11.4 500\n",
            ),
        );

        let listing = list_versions(&runner, Some("tensorrt"), &Log::default()).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].versions, vec!["8.5.2.2", "8.4.1.5"]);
        assert_eq!(runner.calls(), vec!["apt-cache policy tensorrt"]);
    }

    #[test]
    fn test_unknown_component_runs_nothing() {
        let runner = MockRunner::new();
        let err = list_versions(&runner, Some("opencl"), &Log::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidInput(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_failed_query_yields_empty_list() {
        let runner = MockRunner::new();
        runner.expect("apt-cache policy cuda", CommandOutput::failure(100, "E: no cache"));
        runner.set_default(CommandOutput::success("x:\n  Candidate: 1.0-1\n"));
        let logger = Arc::new(MemoryLogger::new());

        let listing = list_versions(&runner, None, &Log::new(logger.clone())).unwrap();
        assert_eq!(listing.len(), COMPONENT_PACKAGES.len());
        assert!(listing[0].versions.is_empty());
        assert_eq!(listing[1].versions, vec!["1.0"]);
        assert!(logger.contains(Level::Warning, "cuda"));
    }

    #[test]
    fn test_format() {
        let text = format_versions(&[
            ComponentVersions {
                component: "cudnn".into(),
                package: "libcudnn8".into(),
                versions: vec!["8.6.0.166".into(), "8.2.1.32".into()],
            },
            ComponentVersions {
                component: "cuda".into(),
                package: "cuda".into(),
                versions: vec![],
            },
        ]);
        assert!(text.contains("CUDNN (libcudnn8):\n  - 8.6.0.166\n  - 8.2.1.32\n"));
        assert!(text.contains("CUDA (cuda):\n  No available versions found\n"));
    }
}
