//! Subprocess execution.
//!
//! Commands are structured argument lists, never shell strings. Execution
//! goes through the [`ProcessRunner`] capability so the install pipeline can
//! be driven by a scripted runner in tests.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::errors::{ProvisionError, Result};
use crate::util::log::Log;

/// Builder for subprocess execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessBuilder {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_string_lossy().into_owned(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Start a command that needs root, prefixed with `sudo` when requested.
    pub fn privileged(program: impl AsRef<OsStr>, sudo: bool) -> Self {
        if sudo {
            ProcessBuilder::new("sudo").arg(program)
        } else {
            ProcessBuilder::new(program)
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    pub fn get_program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// What a finished command reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` if the process was killed or never started.
    pub code: Option<i32>,
    /// Captured stdout followed by captured stderr.
    pub output: String,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        CommandOutput {
            success: true,
            code: Some(0),
            output: output.into(),
        }
    }

    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        CommandOutput {
            success: false,
            code: Some(code),
            output: output.into(),
        }
    }
}

/// Runs external commands and reports how they ended.
pub trait ProcessRunner {
    fn run(&self, cmd: &ProcessBuilder) -> CommandOutput;

    /// Run `cmd` and turn an unsuccessful exit into
    /// [`ProvisionError::CommandFailed`] carrying the captured output.
    fn run_checked(&self, cmd: &ProcessBuilder) -> Result<CommandOutput> {
        let out = self.run(cmd);
        if out.success {
            Ok(out)
        } else {
            Err(ProvisionError::CommandFailed {
                command: cmd.display_command(),
                output: out.output,
            })
        }
    }
}

/// Runs commands on the host, streaming their output to the log.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    log: Log,
}

impl SystemRunner {
    pub fn new(log: Log) -> Self {
        SystemRunner { log }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &ProcessBuilder) -> CommandOutput {
        self.log.info(format!("Executing: {}", cmd.display_command()));
        if let Some(cwd) = cmd.get_cwd() {
            self.log.verbose(format!("Working directory: {}", cwd.display()));
        }

        let mut child = match cmd
            .build_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return CommandOutput {
                    success: false,
                    code: None,
                    output: format!("failed to spawn `{}`: {}", cmd.get_program(), e),
                }
            }
        };

        let stderr = child.stderr.take().map(|pipe| {
            let log = self.log.clone();
            thread::spawn(move || stream_lines(pipe, |line| log.warn(line)))
        });

        let mut output = match child.stdout.take() {
            Some(pipe) => stream_lines(pipe, |line| self.log.verbose(line)),
            None => String::new(),
        };

        if let Some(handle) = stderr {
            if let Ok(err_text) = handle.join() {
                output.push_str(&err_text);
            }
        }

        match child.wait() {
            Ok(status) => CommandOutput {
                success: status.success(),
                code: status.code(),
                output,
            },
            Err(e) => CommandOutput {
                success: false,
                code: None,
                output: format!("{output}failed to wait for `{}`: {}", cmd.get_program(), e),
            },
        }
    }
}

/// Forward each line to `emit` as it arrives and return everything read.
fn stream_lines(pipe: impl Read, emit: impl Fn(&str)) -> String {
    let mut collected = String::new();
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();

    while let Ok(n) = reader.read_until(b'\n', &mut line) {
        if n == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        emit(text.trim_end());
        collected.push_str(&text);
        line.clear();
    }

    collected
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}
