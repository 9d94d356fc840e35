// src/driver/rules.rs

//! Trigger rules, milestones and the compiled matcher used on each line.
//!
//! Matching is first-match-wins: for a given line only the earliest rule
//! whose matcher hits is returned by [`RuleSet::first_match`]. Milestones
//! use [`RuleSet::matches`] instead, since they only observe.

use regex::{Regex, RegexBuilder};

use crate::errors::{PromptdriveError, Result};

/// How a rule recognises a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Fires when any of the substrings occurs in the line.
    AnySubstring(Vec<String>),
    /// Fires when the regular expression matches anywhere in the line.
    Regex(String),
}

impl Matcher {
    pub fn substrings<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Matcher::AnySubstring(substrings.into_iter().map(Into::into).collect())
    }
}

/// A prompt and the canned answer written to the child's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRule {
    pub matcher: Matcher,
    pub response: String,
    pub append_newline: bool,
    /// Never log the response text.
    pub secret: bool,
    pub label: Option<String>,
}

impl TriggerRule {
    /// Substring rule; the response is followed by a newline.
    pub fn new<I, S>(substrings: I, response: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_matcher(Matcher::substrings(substrings), response)
    }

    pub fn regex(pattern: impl Into<String>, response: impl Into<String>) -> Self {
        Self::with_matcher(Matcher::Regex(pattern.into()), response)
    }

    pub fn with_matcher(matcher: Matcher, response: impl Into<String>) -> Self {
        Self {
            matcher,
            response: response.into(),
            append_newline: true,
            secret: false,
            label: None,
        }
    }

    pub fn without_newline(mut self) -> Self {
        self.append_newline = false;
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bytes actually written to stdin when the rule fires.
    pub fn payload(&self) -> String {
        if self.append_newline {
            format!("{}\n", self.response)
        } else {
            self.response.clone()
        }
    }

    /// Response text safe to put in a log line.
    pub fn loggable_response(&self) -> &str {
        if self.secret { "<redacted>" } else { &self.response }
    }

    pub fn display_name(&self, index: usize) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("rule #{index}"),
        }
    }
}

/// An output line worth reporting; never writes to the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub matcher: Matcher,
    pub message: String,
}

impl Milestone {
    pub fn new<I, S>(substrings: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matcher: Matcher::substrings(substrings),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum CompiledMatcher {
    /// Needles are already lowercased when matching is case-insensitive.
    Substrings(Vec<String>),
    Regex(Regex),
}

impl CompiledMatcher {
    fn compile(matcher: &Matcher, case_insensitive: bool) -> std::result::Result<Self, String> {
        match matcher {
            Matcher::AnySubstring(needles) => {
                if needles.is_empty() {
                    return Err("match list must not be empty".to_string());
                }
                if needles.iter().any(|n| n.is_empty()) {
                    return Err("match substrings must not be empty".to_string());
                }
                let needles = needles
                    .iter()
                    .map(|n| {
                        if case_insensitive {
                            n.to_lowercase()
                        } else {
                            n.clone()
                        }
                    })
                    .collect();
                Ok(CompiledMatcher::Substrings(needles))
            }
            Matcher::Regex(pattern) => RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map(CompiledMatcher::Regex)
                .map_err(|e| format!("invalid regex '{pattern}': {e}")),
        }
    }

    /// `folded` is the lowercased line when matching case-insensitively.
    fn is_match(&self, line: &str, folded: Option<&str>) -> bool {
        match self {
            CompiledMatcher::Substrings(needles) => {
                let haystack = folded.unwrap_or(line);
                needles.iter().any(|n| haystack.contains(n.as_str()))
            }
            CompiledMatcher::Regex(re) => re.is_match(line),
        }
    }
}

/// Ordered, compiled matchers ready to be evaluated against output lines.
#[derive(Debug, Clone)]
pub struct RuleSet {
    matchers: Vec<CompiledMatcher>,
    case_insensitive: bool,
}

impl RuleSet {
    pub fn compile<'a, I>(matchers: I, case_insensitive: bool) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Matcher>,
    {
        let matchers = matchers
            .into_iter()
            .enumerate()
            .map(|(idx, m)| {
                CompiledMatcher::compile(m, case_insensitive)
                    .map_err(|e| PromptdriveError::ConfigError(format!("rule #{idx}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            matchers,
            case_insensitive,
        })
    }

    pub fn for_rules(rules: &[TriggerRule], case_insensitive: bool) -> Result<Self> {
        Self::compile(rules.iter().map(|r| &r.matcher), case_insensitive)
    }

    pub fn for_milestones(milestones: &[Milestone], case_insensitive: bool) -> Result<Self> {
        Self::compile(milestones.iter().map(|m| &m.matcher), case_insensitive)
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Index of the earliest matcher that hits `line`.
    pub fn first_match(&self, line: &str) -> Option<usize> {
        let folded = self.fold(line);
        self.matchers
            .iter()
            .position(|m| m.is_match(line, folded.as_deref()))
    }

    /// Indices of every matcher that hits `line`, in order.
    pub fn matches(&self, line: &str) -> Vec<usize> {
        let folded = self.fold(line);
        self.matchers
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_match(line, folded.as_deref()))
            .map(|(idx, _)| idx)
            .collect()
    }

    fn fold(&self, line: &str) -> Option<String> {
        self.case_insensitive.then(|| line.to_lowercase())
    }
}
