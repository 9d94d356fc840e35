// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::StderrMode;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [defaults]
/// timeout = "10m"
///
/// [profile.android-preview]
/// command = "npx"
/// args = ["eas-cli", "build", "--platform", "android", "--profile", "preview"]
/// env_from = ["EXPO_TOKEN"]
///
/// [[profile.android-preview.rule]]
/// match = ["Generate a new Android Keystore"]
/// response = "y"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Keys are profile names (e.g. `"android-preview"`).
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileConfig>,
}

/// Validated configuration. Only constructed through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub defaults: DefaultsSection,
    pub profile: BTreeMap<String, ProfileConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        defaults: DefaultsSection,
        profile: BTreeMap<String, ProfileConfig>,
    ) -> Self {
        Self { defaults, profile }
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profile.keys().map(String::as_str)
    }
}

/// `[defaults]` section; every profile falls back to these.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_timeout")]
    pub timeout: String,

    #[serde(default)]
    pub case_insensitive: bool,

    #[serde(default)]
    pub stderr: StderrMode,

    #[serde(default = "default_true")]
    pub echo_stdout: bool,

    /// How long to keep reading stdout after the child exits.
    #[serde(default = "default_drain_grace")]
    pub drain_grace: String,
}

fn default_timeout() -> String {
    "10m".to_string()
}

fn default_drain_grace() -> String {
    "500ms".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            case_insensitive: false,
            stderr: StderrMode::default(),
            echo_stdout: true,
            drain_grace: default_drain_grace(),
        }
    }
}

/// `[profile.<name>]` section: one use case of the driver.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub description: Option<String>,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Relative paths are resolved against the config file's directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Literal, non-secret environment overrides.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Variables copied from the invoking environment when the profile runs.
    /// This is where tokens belong.
    #[serde(default)]
    pub env_from: Vec<String>,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub case_insensitive: Option<bool>,

    #[serde(default)]
    pub stderr: Option<StderrMode>,

    #[serde(default)]
    pub echo_stdout: Option<bool>,

    /// Lines written to stdin right after launch.
    #[serde(default)]
    pub initial_input: Vec<String>,

    /// Like `initial_input`, but each entry names an environment variable
    /// whose value is written (after the literal lines).
    #[serde(default)]
    pub initial_input_env: Vec<String>,

    /// Close stdin after the initial input, for tools that read to EOF.
    #[serde(default)]
    pub close_stdin: bool,

    #[serde(default)]
    pub rule: Vec<RuleConfig>,

    #[serde(default)]
    pub milestone: Vec<MilestoneConfig>,
}

/// `[[profile.<name>.rule]]` entry.
///
/// Exactly one of `match` / `regex`, and exactly one of `response` /
/// `response_env`.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    #[serde(default, rename = "match")]
    pub matches: Vec<String>,

    #[serde(default)]
    pub regex: Option<String>,

    #[serde(default)]
    pub response: Option<String>,

    /// Take the response from this environment variable; implies `secret`.
    #[serde(default)]
    pub response_env: Option<String>,

    #[serde(default = "default_true")]
    pub append_newline: bool,

    #[serde(default)]
    pub secret: bool,

    #[serde(default)]
    pub label: Option<String>,
}

/// `[[profile.<name>.milestone]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneConfig {
    #[serde(default, rename = "match")]
    pub matches: Vec<String>,

    #[serde(default)]
    pub regex: Option<String>,

    pub message: String,
}
