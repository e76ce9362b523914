//! Provisioning error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ops::ledger::Stage;

/// Error raised while fetching artifacts or running the install pipeline.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{url} responded with HTTP {status}")]
    ResourceUnavailable { url: String, status: u16 },

    #[error("{action} `{}`: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed\n{output}")]
    CommandFailed { command: String, output: String },

    #[error("{message}")]
    TransferFailed { artifact: String, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("stage `{stage}` failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<ProvisionError>,
    },
}

impl ProvisionError {
    /// Wrap an I/O error with the action and path it happened on.
    pub fn fs(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ProvisionError::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether another transfer attempt may succeed where this one failed.
    ///
    /// Transport failures, digest mismatches and remote status errors are
    /// retried; everything else aborts the transfer immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProvisionError::TransientNetwork(_)
                | ProvisionError::IntegrityMismatch { .. }
                | ProvisionError::ResourceUnavailable { .. }
        )
    }

    /// Attribute this error to a pipeline stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        ProvisionError::StageFailed {
            stage,
            source: Box::new(self),
        }
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ProvisionError::ResourceUnavailable {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
            };
        }
        if err.is_builder() {
            return ProvisionError::InvalidInput(err.to_string());
        }
        ProvisionError::TransientNetwork(err.to_string())
    }
}

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ProvisionError::TransientNetwork("reset".into()).is_retryable());
        assert!(ProvisionError::ResourceUnavailable {
            url: "https://example.com".into(),
            status: 503,
        }
        .is_retryable());
        assert!(ProvisionError::IntegrityMismatch {
            path: PathBuf::from("a.zip"),
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .is_retryable());

        assert!(!ProvisionError::InvalidInput("bad url".into()).is_retryable());
        assert!(!ProvisionError::fs(
            "failed to write",
            "a.zip",
            io::Error::from(io::ErrorKind::PermissionDenied)
        )
        .is_retryable());
    }

    #[test]
    fn test_stage_failure_names_stage() {
        let err = ProvisionError::CommandFailed {
            command: "make -j4".into(),
            output: "error: foo.cpp".into(),
        }
        .in_stage(Stage::BuildCompiled);

        let msg = err.to_string();
        assert!(msg.contains("build-compiled"));
        assert!(msg.contains("make -j4"));
    }
}
