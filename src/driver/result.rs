// src/driver/result.rs

use std::time::Duration;

use crate::types::TerminationReason;

/// One response written to the child's stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentResponse {
    /// Index into `DriverResult::captured_output_lines`.
    pub line_index: usize,
    /// Index into `DriverConfig::rules`.
    pub rule_index: usize,
}

/// Everything a finished run reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverResult {
    /// Child exit code; `None` when killed by a signal or never launched.
    pub exit_code: Option<i32>,
    pub termination_reason: TerminationReason,
    pub captured_output_lines: Vec<String>,
    /// Only filled when stderr is in `capture` mode.
    pub captured_error_lines: Vec<String>,
    pub responses: Vec<SentResponse>,
    /// Milestone messages, in the order they were first reached.
    pub milestones: Vec<String>,
    /// Launch error or I/O failure text.
    pub error: Option<String>,
    pub duration: Duration,
}

impl DriverResult {
    pub(crate) fn launch_failed(error: String, duration: Duration) -> Self {
        Self {
            exit_code: None,
            termination_reason: TerminationReason::LaunchFailed,
            captured_output_lines: Vec::new(),
            captured_error_lines: Vec::new(),
            responses: Vec::new(),
            milestones: Vec::new(),
            error: Some(error),
            duration,
        }
    }

    /// True only for a clean `Exited` with code 0.
    pub fn success(&self) -> bool {
        self.termination_reason == TerminationReason::Exited && self.exit_code == Some(0)
    }
}
