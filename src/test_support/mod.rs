//! Test utilities and mocks for jetbuild unit tests.
//!
//! This module provides doubles for the capabilities the install pipeline
//! is injected with: a scripted process runner, a capturing logger and
//! a scripted fetcher, plus builders for archive fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use jetbuild::test_support::{MockRunner, MemoryLogger};
//!
//! #[test]
//! fn test_example() {
//!     let runner = MockRunner::new();
//!     runner.expect("sudo ldconfig", CommandOutput::success(""));
//!
//!     // Pass &runner wherever a &dyn ProcessRunner is expected...
//!     assert_eq!(runner.calls(), vec!["sudo ldconfig"]);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::net::{Fetch, TransferOutcome, TransferRequest};
use crate::util::log::{Level, Logger};
use crate::util::process::{CommandOutput, ProcessBuilder, ProcessRunner};

/// Pattern for matching commands in MockRunner.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on the displayed command.
    Exact(String),
    /// Match if the command starts with prefix.
    StartsWith(String),
    /// Match if the command contains substring.
    Contains(String),
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
        }
    }
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
pub struct CommandExpectation {
    /// Pattern to match against commands.
    pub pattern: CommandPattern,
    /// Output to return when matched.
    pub output: CommandOutput,
    /// Number of times this expectation can be used (None = unlimited).
    pub times: Option<usize>,
    /// Number of times this expectation has been used.
    pub used: usize,
}

impl CommandExpectation {
    pub fn new(pattern: CommandPattern, output: CommandOutput) -> Self {
        CommandExpectation {
            pattern,
            output,
            times: None,
            used: 0,
        }
    }

    /// Set the number of times this expectation can be used.
    pub fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Check if this expectation can still be used.
    pub fn available(&self) -> bool {
        match self.times {
            Some(n) => self.used < n,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    expectations: Vec<CommandExpectation>,
    calls: Vec<ProcessBuilder>,
    default_output: Option<CommandOutput>,
}

/// Scripted [`ProcessRunner`].
///
/// Expectations are tried in the order they were added; the first one that
/// matches and is not used up answers. Unmatched commands fail with exit
/// code 127 unless a default output is set. Every call is recorded.
#[derive(Debug, Default)]
pub struct MockRunner {
    state: Mutex<RunnerState>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner::default()
    }

    fn push(&self, expectation: CommandExpectation) -> &Self {
        self.state.lock().unwrap().expectations.push(expectation);
        self
    }

    /// Add an expectation for an exact command match.
    pub fn expect(&self, cmd: &str, output: CommandOutput) -> &Self {
        self.push(CommandExpectation::new(
            CommandPattern::Exact(cmd.to_string()),
            output,
        ))
    }

    /// Exact match that answers at most `n` times.
    pub fn expect_times(&self, cmd: &str, output: CommandOutput, n: usize) -> &Self {
        self.push(
            CommandExpectation::new(CommandPattern::Exact(cmd.to_string()), output).times(n),
        )
    }

    /// Add an expectation for a command starting with a prefix.
    pub fn expect_prefix(&self, prefix: &str, output: CommandOutput) -> &Self {
        self.push(CommandExpectation::new(
            CommandPattern::StartsWith(prefix.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&self, substring: &str, output: CommandOutput) -> &Self {
        self.push(CommandExpectation::new(
            CommandPattern::Contains(substring.to_string()),
            output,
        ))
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&self, output: CommandOutput) -> &Self {
        self.state.lock().unwrap().default_output = Some(output);
        self
    }

    /// Displayed form of every command run so far.
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(ProcessBuilder::display_command)
            .collect()
    }

    /// Every command run so far, with working directories.
    pub fn commands(&self) -> Vec<ProcessBuilder> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Verify that all expectations with a specific count were satisfied.
    pub fn verify(&self) -> Result<(), String> {
        let state = self.state.lock().unwrap();
        for (i, exp) in state.expectations.iter().enumerate() {
            if let Some(expected) = exp.times {
                if exp.used != expected {
                    return Err(format!(
                        "expectation {} was used {} times, expected {}",
                        i, exp.used, expected
                    ));
                }
            }
        }
        Ok(())
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, cmd: &ProcessBuilder) -> CommandOutput {
        let full_cmd = cmd.display_command();
        let mut state = self.state.lock().unwrap();
        state.calls.push(cmd.clone());

        for exp in &mut state.expectations {
            if exp.pattern.matches(&full_cmd) && exp.available() {
                exp.used += 1;
                return exp.output.clone();
            }
        }

        match &state.default_output {
            Some(default) => default.clone(),
            None => CommandOutput::failure(127, format!("unexpected command: {full_cmd}")),
        }
    }
}

/// [`Logger`] that keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        MemoryLogger::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().unwrap().clone()
    }

    /// Whether a line at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

/// Scripted [`Fetch`] that writes canned bytes to the destination.
///
/// Requests for names without a script fail.
#[derive(Debug, Default)]
pub struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<TransferRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        MockFetcher::default()
    }

    /// Serve `body` for requests named `name`.
    pub fn serve(mut self, name: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(name.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetch for MockFetcher {
    fn fetch(&self, request: &TransferRequest) -> TransferOutcome {
        self.requests.lock().unwrap().push(request.clone());
        match self.bodies.get(&request.name) {
            Some(body) => match std::fs::write(request.destination(), body) {
                Ok(()) => TransferOutcome::succeeded("Download completed", body.len() as u64),
                Err(e) => TransferOutcome::failed(e.to_string()),
            },
            None => TransferOutcome::failed(format!("Download of {} failed: 404", request.label())),
        }
    }
}

/// Build a gzipped tarball in memory from `(path, contents)` pairs.
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut data, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_order_and_times() {
        let runner = MockRunner::new();
        runner.expect_times("make -j4", CommandOutput::failure(2, "boom"), 1);
        runner.expect_prefix("make", CommandOutput::success("ok"));

        let cmd = ProcessBuilder::new("make").arg("-j4");
        assert!(!runner.run(&cmd).success);
        assert!(runner.run(&cmd).success);
        assert_eq!(runner.calls(), vec!["make -j4", "make -j4"]);
        assert!(runner.verify().is_ok());
    }

    #[test]
    fn test_mock_runner_unexpected_command() {
        let runner = MockRunner::new();
        let out = runner.run(&ProcessBuilder::new("rm").arg("-rf"));
        assert!(!out.success);
        assert!(out.output.contains("unexpected command: rm -rf"));
    }

    #[test]
    fn test_tar_gz_fixture_round_trips() {
        let data = tar_gz(&[("a/b.txt", "hi")]);
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(data.as_slice()));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a/b.txt"]);
    }
}
