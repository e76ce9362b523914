//! Transfer requests and outcomes.

use std::path::{Path, PathBuf};

use url::Url;

use crate::errors::{ProvisionError, Result};
use crate::util::fs::absolute;

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Logical artifact name, e.g. "OpenCV-Contrib"
    pub name: String,
    /// Version tag, for progress and log lines
    pub version: String,
    pub url: Url,
    /// Always absolute
    destination: PathBuf,
    /// Hex-encoded SHA-256 of the complete file
    pub sha256: Option<String>,
}

impl TransferRequest {
    /// Create a request, resolving `destination` to an absolute path.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        url: &str,
        destination: impl AsRef<Path>,
    ) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| ProvisionError::InvalidInput(format!("invalid URL `{url}`: {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ProvisionError::InvalidInput(format!(
                    "unsupported URL scheme `{scheme}` in {url}"
                )))
            }
        }

        Ok(TransferRequest {
            name: name.into(),
            version: version.into(),
            url,
            destination: absolute(destination.as_ref())?,
            sha256: None,
        })
    }

    /// Create a request saving into `dir` under the URL's last path segment.
    pub fn into_dir(
        name: impl Into<String>,
        version: impl Into<String>,
        url: &str,
        dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| ProvisionError::InvalidInput(format!("invalid URL `{url}`: {e}")))?;
        let file_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProvisionError::InvalidInput(format!("cannot derive a file name from {url}"))
            })?
            .to_string();
        Self::new(name, version, url, dir.as_ref().join(file_name))
    }

    /// Require the downloaded file to have this SHA-256 digest.
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// "name version", for log lines and progress bars.
    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.version)
    }
}

/// Result of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success: bool,
    pub message: String,
    /// Size of the destination file when the transfer ended
    pub bytes: u64,
}

impl TransferOutcome {
    pub fn succeeded(message: impl Into<String>, bytes: u64) -> Self {
        TransferOutcome {
            success: true,
            message: message.into(),
            bytes,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        TransferOutcome {
            success: false,
            message: message.into(),
            bytes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_is_absolute() {
        let req = TransferRequest::new(
            "OpenCV",
            "4.4.0",
            "https://github.com/opencv/opencv/archive/4.4.0.zip",
            "downloads/opencv-4.4.0.zip",
        )
        .unwrap();

        assert!(req.destination().is_absolute());
        assert!(req.destination().ends_with("downloads/opencv-4.4.0.zip"));
        assert_eq!(req.label(), "OpenCV 4.4.0");
    }

    #[test]
    fn test_into_dir_uses_last_segment() {
        let req = TransferRequest::into_dir(
            "OpenCV",
            "4.5.1",
            "https://github.com/opencv/opencv/archive/4.5.1.zip",
            "/tmp/work",
        )
        .unwrap();

        assert_eq!(req.destination(), Path::new("/tmp/work/4.5.1.zip"));
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            TransferRequest::new("x", "1", "not a url", "/tmp/x"),
            Err(ProvisionError::InvalidInput(_))
        ));
        assert!(matches!(
            TransferRequest::new("x", "1", "ftp://mirror/x.zip", "/tmp/x"),
            Err(ProvisionError::InvalidInput(_))
        ));
        assert!(TransferRequest::into_dir("x", "1", "https://example.com/", "/tmp").is_err());
    }
}
