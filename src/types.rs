use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Terminal state of a driver run.
///
/// - `Exited`: the child exited on its own; the exit code may be non-zero.
/// - `TimedOut`: the deadline passed first and the child was killed.
/// - `LaunchFailed`: the command could not be spawned; no process exists.
/// - `Cancelled`: the caller asked for the child to be killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Exited,
    TimedOut,
    LaunchFailed,
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::Exited => "exited",
            TerminationReason::TimedOut => "timed out",
            TerminationReason::LaunchFailed => "launch failed",
            TerminationReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What to do with the child's standard error.
///
/// Stderr is never scanned for trigger rules, whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    /// Write each line to our own stderr.
    Forward,
    /// Keep lines in `DriverResult::captured_error_lines`.
    Capture,
    /// Read and drop (logged at debug).
    Discard,
}

impl Default for StderrMode {
    fn default() -> Self {
        StderrMode::Forward
    }
}

impl FromStr for StderrMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" => Ok(StderrMode::Forward),
            "capture" => Ok(StderrMode::Capture),
            "discard" => Ok(StderrMode::Discard),
            other => Err(format!(
                "invalid stderr mode: {other} (expected \"forward\", \"capture\" or \"discard\")"
            )),
        }
    }
}
