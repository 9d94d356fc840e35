// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigFile, DefaultsSection, MilestoneConfig, ProfileConfig, RawConfigFile, RuleConfig,
};
use crate::driver::config::MAX_DURATION;
use crate::driver::rules::{Matcher, RuleSet};
use crate::errors::{PromptdriveError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PromptdriveError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.defaults, raw.profile))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_profiles(cfg)?;
    validate_defaults(&cfg.defaults)?;
    for (name, profile) in cfg.profile.iter() {
        validate_profile(name, profile, &cfg.defaults)?;
    }
    Ok(())
}

fn ensure_has_profiles(cfg: &RawConfigFile) -> Result<()> {
    if cfg.profile.is_empty() {
        return Err(PromptdriveError::ConfigError(
            "config must contain at least one [profile.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_defaults(defaults: &DefaultsSection) -> Result<()> {
    positive_timeout("[defaults].timeout", &defaults.timeout)?;
    let grace = parse_duration(&defaults.drain_grace).map_err(|e| {
        PromptdriveError::ConfigError(format!("[defaults].drain_grace: {e}"))
    })?;
    if grace > MAX_DURATION {
        return Err(PromptdriveError::ConfigError(format!(
            "[defaults].drain_grace must be at most {}s",
            MAX_DURATION.as_secs()
        )));
    }
    Ok(())
}

fn validate_profile(name: &str, profile: &ProfileConfig, defaults: &DefaultsSection) -> Result<()> {
    let err = |msg: String| PromptdriveError::ConfigError(format!("profile '{name}': {msg}"));

    if profile.command.trim().is_empty() {
        return Err(err("command must not be empty".to_string()));
    }

    if let Some(timeout) = &profile.timeout {
        positive_timeout(&format!("profile '{name}': timeout"), timeout)?;
    }

    for var in profile.env_from.iter().chain(profile.initial_input_env.iter()) {
        if var.trim().is_empty() {
            return Err(err("environment variable names must not be empty".to_string()));
        }
    }

    let case_insensitive = profile.case_insensitive.unwrap_or(defaults.case_insensitive);

    let mut matchers = Vec::with_capacity(profile.rule.len());
    for (idx, rule) in profile.rule.iter().enumerate() {
        check_response(rule).map_err(|e| err(format!("rule #{idx}: {e}")))?;
        matchers.push(matcher_from(&rule.matches, &rule.regex).map_err(|e| err(format!("rule #{idx}: {e}")))?);
    }
    RuleSet::compile(&matchers, case_insensitive).map_err(|e| err(e.to_string()))?;

    let milestones = profile
        .milestone
        .iter()
        .enumerate()
        .map(|(idx, m): (usize, &MilestoneConfig)| {
            matcher_from(&m.matches, &m.regex).map_err(|e| err(format!("milestone #{idx}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    RuleSet::compile(&milestones, case_insensitive)
        .map_err(|e| err(format!("milestones: {e}")))?;

    Ok(())
}

/// Turn the `match` / `regex` pair of a rule or milestone into a matcher.
pub(crate) fn matcher_from(
    matches: &[String],
    regex: &Option<String>,
) -> std::result::Result<Matcher, String> {
    match (matches.is_empty(), regex) {
        (false, None) => Ok(Matcher::AnySubstring(matches.to_vec())),
        (true, Some(pattern)) => Ok(Matcher::Regex(pattern.clone())),
        (false, Some(_)) => Err("set either `match` or `regex`, not both".to_string()),
        (true, None) => Err("one of `match` or `regex` is required".to_string()),
    }
}

fn check_response(rule: &RuleConfig) -> std::result::Result<(), String> {
    match (&rule.response, &rule.response_env) {
        (Some(_), None) => Ok(()),
        (None, Some(var)) if !var.trim().is_empty() => Ok(()),
        (None, Some(_)) => Err("`response_env` must name a variable".to_string()),
        (Some(_), Some(_)) => Err("set either `response` or `response_env`, not both".to_string()),
        (None, None) => Err("one of `response` or `response_env` is required".to_string()),
    }
}

fn positive_timeout(what: &str, value: &str) -> Result<()> {
    let dur = parse_duration(value)
        .map_err(|e| PromptdriveError::ConfigError(format!("{what}: {e}")))?;
    if dur.is_zero() {
        return Err(PromptdriveError::ConfigError(format!(
            "{what} must be greater than zero (got {value:?})"
        )));
    }
    if dur > MAX_DURATION {
        return Err(PromptdriveError::ConfigError(format!(
            "{what} must be at most {}s (got {value:?})",
            MAX_DURATION.as_secs()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    fn config_error(toml_src: &str) -> String {
        match parse(toml_src) {
            Err(PromptdriveError::ConfigError(msg)) => msg,
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn minimal_profile_is_valid() {
        let cfg = parse(
            r#"
[profile.build]
command = "npx"
"#,
        )
        .expect("valid");
        assert_eq!(cfg.profile_names().collect::<Vec<_>>(), vec!["build"]);
        assert_eq!(cfg.defaults.timeout, "10m");
        assert!(cfg.defaults.echo_stdout);
    }

    #[test]
    fn no_profiles_is_an_error() {
        assert!(config_error("[defaults]\ntimeout = \"1m\"\n").contains("at least one"));
    }

    #[test]
    fn zero_timeout_is_an_error() {
        let msg = config_error(
            r#"
[profile.build]
command = "npx"
timeout = "0s"
"#,
        );
        assert!(msg.contains("profile 'build'"));
        assert!(msg.contains("greater than zero"));
    }

    #[test]
    fn oversized_timeout_is_an_error_not_a_panic() {
        let msg = config_error(
            r#"
[profile.build]
command = "npx"
timeout = "307445734561825861m"
"#,
        );
        assert!(msg.contains("too large"), "{msg}");

        let msg = config_error(
            r#"
[profile.build]
command = "npx"
timeout = "18446744073709551615s"
"#,
        );
        assert!(msg.contains("at most"), "{msg}");
    }

    #[test]
    fn rule_needs_exactly_one_matcher_and_response() {
        let both = config_error(
            r#"
[profile.p]
command = "x"
[[profile.p.rule]]
match = ["a"]
regex = "a"
response = "y"
"#,
        );
        assert!(both.contains("rule #0"));
        assert!(both.contains("not both"));

        let no_response = config_error(
            r#"
[profile.p]
command = "x"
[[profile.p.rule]]
match = ["a"]
"#,
        );
        assert!(no_response.contains("`response` or `response_env` is required"));
    }

    #[test]
    fn invalid_regex_names_the_profile() {
        let msg = config_error(
            r#"
[profile.login]
command = "x"
[[profile.login.rule]]
regex = "(unclosed"
response = "y"
"#,
        );
        assert!(msg.contains("profile 'login'"));
        assert!(msg.contains("invalid regex"));
    }

    #[test]
    fn unknown_stderr_mode_fails_deserialization() {
        let res = parse(
            r#"
[defaults]
stderr = "tee"
[profile.p]
command = "x"
"#,
        );
        assert!(matches!(res, Err(PromptdriveError::TomlError(_))));
    }
}
