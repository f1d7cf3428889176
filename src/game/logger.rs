//! Game logger with verbosity filtering and in-memory capture

use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};

/// Verbosity level for game output
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum VerbosityLevel {
    /// Silent - no output during game
    Silent = 0,
    /// Minimal - only game outcome
    Minimal = 1,
    /// Normal - turns, steps, and key actions (default)
    #[default]
    Normal = 2,
    /// Verbose - all events and state changes
    Verbose = 3,
}

/// Output destination for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    /// Output only to stdout (default)
    #[default]
    Stdout,
    /// Capture only to in-memory buffer (no stdout)
    Memory,
    /// Both stdout and in-memory buffer
    Both,
}

/// A captured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: VerbosityLevel,
    pub message: String,
}

/// Centralized logger. Lives on the game state so every subsystem logs
/// through the same verbosity filter; captured entries let tests assert on
/// what happened without scraping stdout.
#[derive(Debug, Default)]
pub struct GameLogger {
    verbosity: VerbosityLevel,
    output_mode: OutputMode,
    log_buffer: RefCell<Vec<LogEntry>>,
}

impl GameLogger {
    pub fn new() -> Self {
        GameLogger::default()
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            ..Default::default()
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: VerbosityLevel) {
        self.verbosity = verbosity;
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    /// Capture to the in-memory buffer only (suppresses stdout).
    pub fn enable_capture(&mut self) {
        self.output_mode = OutputMode::Memory;
    }

    /// Log at the given level. Takes `&self`; the buffer is behind a
    /// RefCell so subsystems holding shared borrows of the state can log.
    pub fn log(&self, level: VerbosityLevel, message: &str) {
        if level > self.verbosity {
            return;
        }
        match self.output_mode {
            OutputMode::Stdout => println!("{message}"),
            OutputMode::Memory => self.capture(level, message),
            OutputMode::Both => {
                println!("{message}");
                self.capture(level, message);
            }
        }
    }

    pub fn log_minimal(&self, message: &str) {
        self.log(VerbosityLevel::Minimal, message);
    }

    pub fn log_normal(&self, message: &str) {
        self.log(VerbosityLevel::Normal, message);
    }

    pub fn log_verbose(&self, message: &str) {
        self.log(VerbosityLevel::Verbose, message);
    }

    fn capture(&self, level: VerbosityLevel, message: &str) {
        self.log_buffer.borrow_mut().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }

    /// Read-only access to captured entries.
    pub fn logs(&self) -> Ref<'_, Vec<LogEntry>> {
        self.log_buffer.borrow()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.log_buffer
            .borrow()
            .iter()
            .any(|e| e.message.contains(needle))
    }

    pub fn clear_logs(&self) {
        self.log_buffer.borrow_mut().clear();
    }
}

impl Clone for GameLogger {
    fn clone(&self) -> Self {
        GameLogger {
            verbosity: self.verbosity,
            output_mode: self.output_mode,
            log_buffer: RefCell::new(self.log_buffer.borrow().clone()),
        }
    }
}

/// Conditional logging that compiles to a no-op without the
/// `verbose-logging` feature, eliminating format! allocations on hot paths.
#[macro_export]
macro_rules! log_if_verbose {
    ($logger:expr, $($arg:tt)*) => {
        #[cfg(feature = "verbose-logging")]
        {
            $logger.log_normal(&format!($($arg)*));
        }
        #[cfg(not(feature = "verbose-logging"))]
        {
            let _ = &$logger;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_filter() {
        let mut logger = GameLogger::with_verbosity(VerbosityLevel::Minimal);
        logger.enable_capture();

        logger.log_minimal("game over");
        logger.log_normal("turn 3");
        logger.log_verbose("event detail");

        let logs = logger.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "game over");
    }

    #[test]
    fn test_contains() {
        let mut logger = GameLogger::with_verbosity(VerbosityLevel::Verbose);
        logger.enable_capture();
        logger.log_normal("Alice draws a card");

        assert!(logger.contains("draws"));
        assert!(!logger.contains("discards"));
    }

    #[test]
    fn test_level_ordering() {
        assert!(VerbosityLevel::Silent < VerbosityLevel::Minimal);
        assert!(VerbosityLevel::Normal < VerbosityLevel::Verbose);
        assert_eq!(VerbosityLevel::default(), VerbosityLevel::Normal);
    }
}
