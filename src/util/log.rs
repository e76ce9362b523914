//! Injected logging capability.
//!
//! Components receive a [`Log`] handle instead of reaching for a global
//! logger. The default sink forwards to `tracing`; tests swap in a capturing
//! sink and assert on what was reported.

use std::fmt::{self, Display};
use std::sync::Arc;

/// Log severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Fatal,
    Error,
    Warning,
    Info,
    Verbose,
}

impl Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Verbose => "verbose",
        };
        f.write_str(s)
    }
}

/// A destination for log lines.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards every line to the `tracing` subscriber installed by the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Fatal => tracing::error!(fatal = true, "{}", message),
            Level::Error => tracing::error!("{}", message),
            Level::Warning => tracing::warn!("{}", message),
            Level::Info => tracing::info!("{}", message),
            Level::Verbose => tracing::debug!("{}", message),
        }
    }
}

/// Cheaply clonable handle to a [`Logger`].
#[derive(Clone)]
pub struct Log {
    sink: Arc<dyn Logger>,
}

impl Log {
    pub fn new(sink: Arc<dyn Logger>) -> Self {
        Log { sink }
    }

    pub fn tracing() -> Self {
        Log::new(Arc::new(TracingLogger))
    }

    pub fn fatal(&self, msg: impl Display) {
        self.sink.log(Level::Fatal, &msg.to_string());
    }

    pub fn error(&self, msg: impl Display) {
        self.sink.log(Level::Error, &msg.to_string());
    }

    pub fn warn(&self, msg: impl Display) {
        self.sink.log(Level::Warning, &msg.to_string());
    }

    pub fn info(&self, msg: impl Display) {
        self.sink.log(Level::Info, &msg.to_string());
    }

    pub fn verbose(&self, msg: impl Display) {
        self.sink.log(Level::Verbose, &msg.to_string());
    }
}

impl Default for Log {
    fn default() -> Self {
        Log::tracing()
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryLogger;

    #[test]
    fn test_levels_reach_sink() {
        let sink = Arc::new(MemoryLogger::new());
        let log = Log::new(sink.clone());

        log.info("starting");
        log.warn("slow mirror");
        log.verbose("chunk 1");

        assert_eq!(
            sink.entries(),
            vec![
                (Level::Info, "starting".to_string()),
                (Level::Warning, "slow mirror".to_string()),
                (Level::Verbose, "chunk 1".to_string()),
            ]
        );
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Fatal < Level::Error);
        assert!(Level::Info < Level::Verbose);
        assert_eq!(Level::Warning.to_string(), "warning");
    }
}
