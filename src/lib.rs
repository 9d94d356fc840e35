// src/lib.rs

pub mod cli;
pub mod config;
pub mod driver;
pub mod errors;
pub mod logging;
pub mod types;

use anyhow::{Result, anyhow};
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{
    ConfigFile, config_base_dir, default_config_path, load_and_validate, parse_duration,
};
use crate::driver::{Driver, DriverConfig, DriverResult};
use crate::types::TerminationReason;

/// Exit status used when the child was killed by the timeout.
pub const EXIT_TIMED_OUT: i32 = 1;
/// Exit status used when the command could not be launched.
pub const EXIT_LAUNCH_FAILED: i32 = 127;
/// Exit status used when the run was cancelled with Ctrl-C.
pub const EXIT_CANCELLED: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and profile resolution
/// - the driver run
/// - Ctrl-C handling
///
/// Returns the exit status the binary should terminate with.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;

    if args.list {
        print_profiles(&cfg);
        return Ok(0);
    }

    let name = args
        .profile
        .as_deref()
        .ok_or_else(|| anyhow!("--profile is required unless --list is given"))?;
    let base_dir = config_base_dir(&config_path);

    let mut driver_cfg = if args.dry_run {
        // Unset secrets are shown as placeholders; values are never printed.
        cfg.driver_config(name, &base_dir, |var| {
            Some(std::env::var(var).unwrap_or_else(|_| "<unset>".to_string()))
        })?
    } else {
        cfg.driver_config_from_env(name, &base_dir)?
    };

    if let Some(timeout) = &args.timeout {
        driver_cfg.timeout = parse_duration(timeout).map_err(|e| anyhow!("--timeout: {e}"))?;
        driver_cfg.validate()?;
    }

    if args.dry_run {
        print_dry_run(name, &driver_cfg);
        return Ok(0);
    }

    let (handle, join) = Driver::new(driver_cfg).spawn();

    // Ctrl-C → kill the child; the run ends as Cancelled.
    let ctrl_c = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl-C received; killing child process");
        if let Err(e) = handle.kill().await {
            debug!(error = %e, "kill not delivered; driver already finished");
        }
    });

    let result = join.await?;
    ctrl_c.abort();

    report(name, &result);
    Ok(exit_code_for(&result))
}

/// Map a driver result onto the exit status of this process.
///
/// A non-zero child exit code is passed through verbatim.
pub fn exit_code_for(result: &DriverResult) -> i32 {
    match result.termination_reason {
        TerminationReason::Exited => result.exit_code.unwrap_or(1),
        TerminationReason::TimedOut => EXIT_TIMED_OUT,
        TerminationReason::LaunchFailed => EXIT_LAUNCH_FAILED,
        TerminationReason::Cancelled => EXIT_CANCELLED,
    }
}

fn report(profile: &str, result: &DriverResult) {
    if let Some(err) = &result.error {
        error!(profile, error = %err, "driver reported an error");
    }
    for milestone in &result.milestones {
        info!(profile, milestone = %milestone, "reached");
    }

    match result.termination_reason {
        TerminationReason::Exited if result.success() => info!(
            profile,
            responses = result.responses.len(),
            elapsed_secs = result.duration.as_secs(),
            "process exited successfully"
        ),
        TerminationReason::Exited => warn!(
            profile,
            exit_code = ?result.exit_code,
            "process exited with failure"
        ),
        reason => warn!(profile, reason = %reason, "process did not exit on its own"),
    }
}

fn print_profiles(cfg: &ConfigFile) {
    println!("profiles ({}):", cfg.profile.len());
    for (name, profile) in cfg.profile.iter() {
        println!("  - {name}");
        println!("      cmd: {} {}", profile.command, profile.args.join(" "));
        if let Some(ref description) = profile.description {
            println!("      about: {description}");
        }
    }
}

/// Print the resolved profile. Env values and secret responses stay hidden.
fn print_dry_run(name: &str, cfg: &DriverConfig) {
    println!("promptdrive dry-run: profile {name}");
    println!("  command: {}", cfg.spec.command);
    if !cfg.spec.args.is_empty() {
        println!("  args: {:?}", cfg.spec.args);
    }
    if let Some(ref dir) = cfg.spec.working_dir {
        println!("  cwd: {}", dir.display());
    }
    if !cfg.spec.env.is_empty() {
        println!("  env: {:?}", cfg.spec.env_keys());
    }
    println!("  timeout: {:?}", cfg.timeout);
    println!("  case_insensitive: {}", cfg.case_insensitive);
    println!("  stderr: {:?}", cfg.stderr);
    if !cfg.initial_input.is_empty() {
        println!("  initial_input: {} line(s)", cfg.initial_input.len());
    }
    if cfg.close_stdin {
        println!("  close_stdin: true");
    }
    println!();

    println!("rules ({}):", cfg.rules.len());
    for (idx, rule) in cfg.rules.iter().enumerate() {
        println!("  - {}", rule.display_name(idx));
        println!("      match: {:?}", rule.matcher);
        println!("      response: {:?}", rule.loggable_response());
        if !rule.append_newline {
            println!("      append_newline: false");
        }
    }

    if !cfg.milestones.is_empty() {
        println!("milestones ({}):", cfg.milestones.len());
        for m in cfg.milestones.iter() {
            println!("  - {} ({:?})", m.message, m.matcher);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn result(reason: TerminationReason, code: Option<i32>) -> DriverResult {
        DriverResult {
            exit_code: code,
            termination_reason: reason,
            captured_output_lines: Vec::new(),
            captured_error_lines: Vec::new(),
            responses: Vec::new(),
            milestones: Vec::new(),
            error: None,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn exit_codes_follow_termination_reason() {
        assert_eq!(exit_code_for(&result(TerminationReason::Exited, Some(0))), 0);
        assert_eq!(exit_code_for(&result(TerminationReason::Exited, Some(3))), 3);
        assert_eq!(exit_code_for(&result(TerminationReason::Exited, None)), 1);
        assert_eq!(exit_code_for(&result(TerminationReason::TimedOut, None)), EXIT_TIMED_OUT);
        assert_eq!(
            exit_code_for(&result(TerminationReason::LaunchFailed, None)),
            EXIT_LAUNCH_FAILED
        );
        assert_eq!(exit_code_for(&result(TerminationReason::Cancelled, None)), EXIT_CANCELLED);
    }
}
