//! Resumable, verified downloads.
//!
//! A transfer is idempotent: a destination that already verifies is left
//! alone, a partial destination is continued with a `Range` request, and a
//! destination that fails verification is discarded and fetched again.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;
use url::Url;

use crate::errors::{ProvisionError, Result};
use crate::net::request::{TransferOutcome, TransferRequest};
use crate::net::retry::RetryPolicy;
use crate::util::fs::{ensure_dir, file_len, remove_file_if_exists};
use crate::util::hash::{sha256_file, verify_digest, DEFAULT_CHUNK_SIZE};
use crate::util::log::Log;

/// Transfer engine settings.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Connect timeout, and total timeout for size probes
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Read size for streaming and hashing
    pub chunk_size: usize,
    pub user_agent: String,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            user_agent: concat!("jetbuild/", env!("CARGO_PKG_VERSION")).to_string(),
            show_progress: false,
        }
    }
}

/// Something that can materialize a [`TransferRequest`] on disk.
pub trait Fetch {
    fn fetch(&self, request: &TransferRequest) -> TransferOutcome;
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Downloads artifacts over one HTTP session.
///
/// The session is used for one request at a time; give each concurrent
/// transfer its own engine.
pub struct TransferEngine {
    client: Client,
    config: TransferConfig,
    log: Log,
    sleeper: Sleeper,
}

impl TransferEngine {
    /// Create an engine with its own HTTP session.
    pub fn new(config: TransferConfig, log: Log) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .timeout(Option::<Duration>::None)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProvisionError::InvalidInput(format!("failed to create HTTP client: {e}")))?;

        Ok(TransferEngine {
            client,
            config,
            log,
            sleeper: Box::new(std::thread::sleep),
        })
    }

    /// Replace how the engine waits between attempts.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Fetch several artifacts one after another, keyed by artifact name.
    pub fn fetch_all<'a>(
        &self,
        requests: impl IntoIterator<Item = &'a TransferRequest>,
    ) -> BTreeMap<String, TransferOutcome> {
        let mut results = BTreeMap::new();
        for request in requests {
            self.log.info(format!("Processing: {}", request.label()));
            results.insert(request.name.clone(), self.fetch(request));
        }
        results
    }

    fn transfer(&self, req: &TransferRequest) -> Result<TransferOutcome> {
        let dest = req.destination();
        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }

        let expected = req.sha256.as_deref();
        let chunk = self.config.chunk_size;

        let local = file_len(dest)?;
        if let Some(len) = local {
            if verify_digest(dest, expected, chunk)? {
                self.log.info(format!("File exists and verified: {}", dest.display()));
                return Ok(TransferOutcome::succeeded("File already downloaded", len));
            }
        }

        let remote_total = self.remote_size(&req.url);
        if let (Some(len), Some(total)) = (local, remote_total) {
            if len >= total {
                if verify_digest(dest, expected, chunk)? {
                    return Ok(TransferOutcome::succeeded("File already downloaded", len));
                }
                self.log.warn(format!(
                    "Local file is {len} bytes but remote is {total}; downloading again"
                ));
                self.discard(dest)?;
            }
        }

        let policy = self.config.retry;
        let mut last_error = None;

        for attempt in policy.attempts() {
            if let Some(delay) = policy.delay_before(attempt) {
                self.log.warn(format!(
                    "Retrying {} in {:.1}s (attempt {attempt}/{})",
                    req.label(),
                    delay.as_secs_f64(),
                    policy.max_attempts
                ));
                (self.sleeper)(delay);
            }

            match self.attempt(req, remote_total) {
                Ok(bytes) => {
                    self.log.info(format!("File downloaded successfully: {}", dest.display()));
                    return Ok(TransferOutcome::succeeded("Download successful", bytes));
                }
                Err(e) if e.is_retryable() => {
                    self.log.warn(format!("Download of {} failed: {e}", req.label()));
                    if matches!(e, ProvisionError::IntegrityMismatch { .. }) {
                        self.discard(dest)?;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProvisionError::TransientNetwork("no download attempt was made".to_string())
        }))
    }

    /// One streamed request, continuing from whatever is already on disk.
    fn attempt(&self, req: &TransferRequest, remote_total: Option<u64>) -> Result<u64> {
        let dest = req.destination();
        let offset = file_len(dest)?.unwrap_or(0);

        let mut request = self.client.get(req.url.clone());
        if offset > 0 {
            self.log.info(format!("Resuming {} from byte {offset}", req.label()));
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let mut response = request.send()?;

        let status = response.status();
        let append = if status == StatusCode::PARTIAL_CONTENT && offset > 0 {
            true
        } else if status.is_success() {
            if offset > 0 {
                self.log.warn("Server ignored the range request; restarting from zero");
            }
            false
        } else {
            if status == StatusCode::RANGE_NOT_SATISFIABLE {
                self.discard(dest)?;
            }
            return Err(ProvisionError::ResourceUnavailable {
                url: req.url.to_string(),
                status: status.as_u16(),
            });
        };

        let start = if append { offset } else { 0 };
        let expected_total = response
            .content_length()
            .map(|len| start + len)
            .or(remote_total);

        let mut file = open_destination(dest, append)?;
        let pb = self.progress_bar(req, expected_total, start);
        let written = self.stream(&mut response, &mut file, dest, &pb);
        pb.finish_and_clear();
        let total = start + written?;

        if let Some(expected_total) = expected_total {
            if total < expected_total {
                return Err(ProvisionError::TransientNetwork(format!(
                    "connection closed after {total} of {expected_total} bytes"
                )));
            }
        }

        if let Some(expected) = req.sha256.as_deref() {
            let actual = sha256_file(dest, self.config.chunk_size)?;
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(ProvisionError::IntegrityMismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(total)
    }

    fn stream(
        &self,
        body: &mut impl Read,
        file: &mut File,
        dest: &Path,
        pb: &ProgressBar,
    ) -> Result<u64> {
        let mut buffer = vec![0u8; self.config.chunk_size.max(1)];
        let mut written = 0u64;

        loop {
            let n = match body.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProvisionError::TransientNetwork(e.to_string())),
            };
            file.write_all(&buffer[..n])
                .map_err(|e| ProvisionError::fs("failed to write", dest, e))?;
            written += n as u64;
            pb.inc(n as u64);
        }

        file.flush()
            .map_err(|e| ProvisionError::fs("failed to flush", dest, e))?;
        Ok(written)
    }

    /// Best-effort size probe; any failure means "unknown".
    fn remote_size(&self, url: &Url) -> Option<u64> {
        let response = self
            .client
            .head(url.clone())
            .timeout(self.config.timeout)
            .send()
            .and_then(|r| r.error_for_status());

        match response {
            Ok(r) => r
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|&n| n > 0),
            Err(e) => {
                self.log.warn(format!("Failed to get file size: {e}"));
                None
            }
        }
    }

    fn discard(&self, path: &Path) -> Result<()> {
        remove_file_if_exists(path)
            .map(|_| ())
            .map_err(|e| ProvisionError::fs("failed to remove", path, e))
    }

    /// Remove an incomplete destination after a failed transfer, never failing.
    fn cleanup(&self, path: &Path) {
        match remove_file_if_exists(path) {
            Ok(true) => self.log.info("Cleaned up incomplete file"),
            Ok(false) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => self.log.warn(format!(
                "Unable to clean up incomplete file {}, it may be in use by another process",
                path.display()
            )),
            Err(e) => self.log.warn(format!(
                "Unable to clean up incomplete file {}: {e}",
                path.display()
            )),
        }
    }

    fn progress_bar(&self, req: &TransferRequest, total: Option<u64>, initial: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = match total {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::no_length(),
        };
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb.set_message(format!("Downloading {}", req.label()));
        pb.set_position(initial);
        pb
    }
}

impl Fetch for TransferEngine {
    fn fetch(&self, request: &TransferRequest) -> TransferOutcome {
        match self.transfer(request) {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("Download of {} failed: {e}", request.label());
                self.log.error(&message);
                self.cleanup(request.destination());
                TransferOutcome::failed(message)
            }
        }
    }
}

fn open_destination(path: &Path, append: bool) -> Result<File> {
    let result = if append {
        OpenOptions::new().append(true).open(path)
    } else {
        File::create(path)
    };
    result.map_err(|e| ProvisionError::fs("failed to open", path, e))
}
