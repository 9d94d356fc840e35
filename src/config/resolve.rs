// src/config/resolve.rs

//! Turn a validated profile into a ready-to-run `DriverConfig`.
//!
//! Secrets enter here and nowhere else: `env_from`, `response_env` and
//! `initial_input_env` are looked up through a caller-supplied function at
//! invocation time. Error messages name missing variables, never values.

use std::path::Path;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, ProfileConfig};
use crate::config::validate::matcher_from;
use crate::driver::{DriverConfig, Milestone, ProcessSpec, TriggerRule};
use crate::errors::{PromptdriveError, Result};

impl ConfigFile {
    pub fn get_profile(&self, name: &str) -> Result<&ProfileConfig> {
        self.profile
            .get(name)
            .ok_or_else(|| PromptdriveError::ProfileNotFound(name.to_string()))
    }

    /// Resolve `name` using the process environment for secrets.
    pub fn driver_config_from_env(&self, name: &str, base_dir: &Path) -> Result<DriverConfig> {
        self.driver_config(name, base_dir, |var| std::env::var(var).ok())
    }

    /// Resolve `name`, looking up environment-sourced values with `lookup`.
    ///
    /// `base_dir` anchors a relative `cwd` (normally the config file's
    /// directory).
    pub fn driver_config<F>(&self, name: &str, base_dir: &Path, lookup: F) -> Result<DriverConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile = self.get_profile(name)?;
        let err = |msg: String| PromptdriveError::ConfigError(format!("profile '{name}': {msg}"));
        let require = |var: &str| {
            lookup(var).ok_or_else(|| err(format!("environment variable {var} is not set")))
        };

        let mut spec = ProcessSpec::new(&profile.command).args(profile.args.iter().cloned());
        if let Some(cwd) = &profile.cwd {
            spec = spec.current_dir(if cwd.is_absolute() {
                cwd.clone()
            } else {
                base_dir.join(cwd)
            });
        }
        for (key, value) in profile.env.iter() {
            spec = spec.env(key, value);
        }
        for var in profile.env_from.iter() {
            spec = spec.env(var, require(var)?);
        }

        let timeout_str = profile.timeout.as_deref().unwrap_or(&self.defaults.timeout);
        let timeout = parse_duration(timeout_str).map_err(|e| err(format!("timeout: {e}")))?;
        let drain_grace = parse_duration(&self.defaults.drain_grace)
            .map_err(|e| err(format!("drain_grace: {e}")))?;

        let mut builder = DriverConfig::builder(spec, timeout)
            .case_insensitive(profile.case_insensitive.unwrap_or(self.defaults.case_insensitive))
            .stderr(profile.stderr.unwrap_or(self.defaults.stderr))
            .echo_stdout(profile.echo_stdout.unwrap_or(self.defaults.echo_stdout))
            .drain_grace(drain_grace);

        for line in profile.initial_input.iter() {
            builder = builder.initial_input(line);
        }
        for var in profile.initial_input_env.iter() {
            builder = builder.initial_input(require(var)?);
        }
        builder = builder.close_stdin(profile.close_stdin);

        for (idx, rule_cfg) in profile.rule.iter().enumerate() {
            let matcher = matcher_from(&rule_cfg.matches, &rule_cfg.regex)
                .map_err(|e| err(format!("rule #{idx}: {e}")))?;
            let response = match (&rule_cfg.response, &rule_cfg.response_env) {
                (Some(text), _) => text.clone(),
                (None, Some(var)) => require(var)?,
                (None, None) => {
                    return Err(err(format!("rule #{idx}: no response configured")));
                }
            };

            let mut rule = TriggerRule::with_matcher(matcher, response);
            rule.append_newline = rule_cfg.append_newline;
            rule.secret = rule_cfg.secret || rule_cfg.response_env.is_some();
            rule.label = rule_cfg.label.clone();
            builder = builder.rule(rule);
        }

        for (idx, m) in profile.milestone.iter().enumerate() {
            let matcher = matcher_from(&m.matches, &m.regex)
                .map_err(|e| err(format!("milestone #{idx}: {e}")))?;
            builder = builder.milestone(Milestone {
                matcher,
                message: m.message.clone(),
            });
        }

        builder.build().map_err(|e| err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::config::model::RawConfigFile;
    use crate::driver::Matcher;
    use crate::types::StderrMode;

    const CONFIG: &str = r#"
[defaults]
timeout = "10m"
stderr = "capture"

[profile.android]
command = "npx"
args = ["eas-cli", "build", "--platform", "android"]
cwd = "app"
env = { EAS_NO_VCS = "1" }
env_from = ["EXPO_TOKEN"]
timeout = "3m"

[[profile.android.rule]]
match = ["Generate a new Android Keystore"]
response = "y"
label = "keystore"

[[profile.android.rule]]
regex = "Would you like.*create"
response = "y"

[[profile.android.milestone]]
match = ["Build started", "Build link:"]
message = "build initiated"

[profile.login]
command = "npx"
args = ["eas", "login"]
initial_input_env = ["EXPO_USERNAME"]
echo_stdout = false

[[profile.login.rule]]
match = ["Password"]
response_env = "EXPO_PASSWORD"
"#;

    fn config() -> ConfigFile {
        let raw: RawConfigFile = toml::from_str(CONFIG).expect("toml");
        ConfigFile::try_from(raw).expect("valid")
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn resolves_profile_with_overrides() {
        let cfg = config()
            .driver_config("android", Path::new("/work"), env(&[("EXPO_TOKEN", "tok")]))
            .expect("resolves");

        assert_eq!(cfg.spec.command, "npx");
        assert_eq!(cfg.spec.args, vec!["eas-cli", "build", "--platform", "android"]);
        assert_eq!(cfg.spec.working_dir, Some(PathBuf::from("/work/app")));
        assert_eq!(cfg.spec.env.get("EXPO_TOKEN").map(String::as_str), Some("tok"));
        assert_eq!(cfg.spec.env.get("EAS_NO_VCS").map(String::as_str), Some("1"));
        assert_eq!(cfg.timeout, Duration::from_secs(180));
        assert_eq!(cfg.stderr, StderrMode::Capture);
        assert!(cfg.echo_stdout);

        assert_eq!(cfg.rules.len(), 2);
        assert_eq!(cfg.rules[0].label.as_deref(), Some("keystore"));
        assert_eq!(cfg.rules[1].matcher, Matcher::Regex("Would you like.*create".to_string()));
        assert_eq!(cfg.milestones[0].message, "build initiated");
    }

    #[test]
    fn missing_secret_names_variable_only() {
        let err = config()
            .driver_config("android", Path::new("."), env(&[]))
            .unwrap_err();
        match err {
            PromptdriveError::ConfigError(msg) => {
                assert!(msg.contains("EXPO_TOKEN"));
                assert!(msg.contains("profile 'android'"));
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn env_sourced_responses_are_secret() {
        let cfg = config()
            .driver_config(
                "login",
                Path::new("."),
                env(&[("EXPO_USERNAME", "me@example.com"), ("EXPO_PASSWORD", "pw")]),
            )
            .expect("resolves");

        assert_eq!(cfg.initial_input, vec!["me@example.com".to_string()]);
        assert_eq!(cfg.rules[0].response, "pw");
        assert!(cfg.rules[0].secret);
        assert!(!cfg.echo_stdout);
        assert_eq!(cfg.timeout, Duration::from_secs(600));
    }

    #[test]
    fn unknown_profile() {
        let err = config().get_profile("ios").unwrap_err();
        assert!(matches!(err, PromptdriveError::ProfileNotFound(name) if name == "ios"));
    }
}
