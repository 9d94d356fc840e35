// src/driver/config.rs

use std::time::Duration;

use crate::driver::process::ProcessSpec;
use crate::driver::rules::{Milestone, RuleSet, TriggerRule};
use crate::errors::{PromptdriveError, Result};
use crate::types::StderrMode;

/// How long buffered stdout is still read after the child has exited.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Upper bound for `timeout` and `drain_grace` (one year).
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Everything one driver run needs. Built once, consumed by a run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub spec: ProcessSpec,
    /// Evaluated in order; the first match answers the line.
    pub rules: Vec<TriggerRule>,
    pub milestones: Vec<Milestone>,
    /// Wall-clock limit from launch. Must be non-zero.
    pub timeout: Duration,
    pub case_insensitive: bool,
    pub stderr: StderrMode,
    /// Mirror each stdout line to our own stdout.
    pub echo_stdout: bool,
    /// Lines written to stdin right after launch, before any output is read.
    pub initial_input: Vec<String>,
    /// Close stdin once `initial_input` is written, for tools that read
    /// until end of input.
    pub close_stdin: bool,
    pub drain_grace: Duration,
}

impl DriverConfig {
    pub fn builder(spec: ProcessSpec, timeout: Duration) -> DriverConfigBuilder {
        DriverConfigBuilder {
            config: DriverConfig {
                spec,
                rules: Vec::new(),
                milestones: Vec::new(),
                timeout,
                case_insensitive: false,
                stderr: StderrMode::default(),
                echo_stdout: false,
                initial_input: Vec::new(),
                close_stdin: false,
                drain_grace: DEFAULT_DRAIN_GRACE,
            },
        }
    }

    /// Check invariants that would otherwise only surface at run time.
    pub fn validate(&self) -> Result<()> {
        if self.spec.command.trim().is_empty() {
            return Err(PromptdriveError::ConfigError(
                "command must not be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(PromptdriveError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.timeout > MAX_DURATION {
            return Err(PromptdriveError::ConfigError(format!(
                "timeout must be at most {}s (got {}s)",
                MAX_DURATION.as_secs(),
                self.timeout.as_secs()
            )));
        }
        if self.drain_grace > MAX_DURATION {
            return Err(PromptdriveError::ConfigError(format!(
                "drain_grace must be at most {}s",
                MAX_DURATION.as_secs()
            )));
        }
        RuleSet::for_rules(&self.rules, self.case_insensitive)?;
        RuleSet::for_milestones(&self.milestones, self.case_insensitive)?;
        Ok(())
    }
}

/// Builder for [`DriverConfig`].
#[derive(Debug, Clone)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    pub fn rule(mut self, rule: TriggerRule) -> Self {
        self.config.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = TriggerRule>) -> Self {
        self.config.rules.extend(rules);
        self
    }

    pub fn milestone(mut self, milestone: Milestone) -> Self {
        self.config.milestones.push(milestone);
        self
    }

    pub fn case_insensitive(mut self, val: bool) -> Self {
        self.config.case_insensitive = val;
        self
    }

    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.config.stderr = mode;
        self
    }

    pub fn echo_stdout(mut self, val: bool) -> Self {
        self.config.echo_stdout = val;
        self
    }

    pub fn initial_input(mut self, line: impl Into<String>) -> Self {
        self.config.initial_input.push(line.into());
        self
    }

    pub fn close_stdin(mut self, val: bool) -> Self {
        self.config.close_stdin = val;
        self
    }

    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.config.drain_grace = grace;
        self
    }

    pub fn build(self) -> Result<DriverConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = DriverConfig::builder(ProcessSpec::new("true"), Duration::from_secs(1))
            .build()
            .expect("valid config");
        assert!(cfg.rules.is_empty());
        assert!(!cfg.case_insensitive);
        assert_eq!(cfg.stderr, StderrMode::Forward);
        assert_eq!(cfg.drain_grace, DEFAULT_DRAIN_GRACE);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = DriverConfig::builder(ProcessSpec::new("true"), Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, PromptdriveError::ConfigError(msg) if msg.contains("timeout")));
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let err = DriverConfig::builder(ProcessSpec::new("true"), Duration::from_secs(u64::MAX))
            .build()
            .unwrap_err();
        assert!(matches!(err, PromptdriveError::ConfigError(msg) if msg.contains("at most")));

        let res = DriverConfig::builder(ProcessSpec::new("true"), MAX_DURATION)
            .drain_grace(Duration::MAX)
            .build();
        assert!(res.is_err());

        assert!(
            DriverConfig::builder(ProcessSpec::new("true"), MAX_DURATION)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn bad_rule_is_rejected_at_build() {
        let res = DriverConfig::builder(ProcessSpec::new("true"), Duration::from_secs(1))
            .rule(TriggerRule::regex("[unclosed", "y"))
            .build();
        assert!(res.is_err());
    }
}
