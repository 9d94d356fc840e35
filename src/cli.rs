// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `promptdrive`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "promptdrive",
    version,
    about = "Run an interactive CLI and answer its prompts from a profile.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Promptdrive.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Profile to run (a `[profile.<name>]` section of the config).
    #[arg(long, short, value_name = "NAME", required_unless_present = "list")]
    pub profile: Option<String>,

    /// Override the profile's timeout (e.g. "90s", "15m").
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// List the profiles in the config file and exit.
    #[arg(long)]
    pub list: bool,

    /// Resolve the profile and print what would run, without launching it.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROMPTDRIVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_required_unless_listing() {
        assert!(CliArgs::try_parse_from(["promptdrive"]).is_err());

        let args = CliArgs::try_parse_from(["promptdrive", "--list"]).unwrap();
        assert!(args.list);
        assert!(args.config.is_none());

        let args = CliArgs::try_parse_from([
            "promptdrive",
            "-p",
            "android-preview",
            "--timeout",
            "90s",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.profile.as_deref(), Some("android-preview"));
        assert_eq!(args.timeout.as_deref(), Some("90s"));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
