// src/driver/responder.rs

//! Match-and-respond logic applied to one output line at a time.
//!
//! The responder owns the child's stdin writer, so every write (rule
//! responses, initial input, caller writes) goes through the same `&mut self`
//! and is serialized. It knows nothing about processes: tests drive it with
//! [`ScriptedLines`](crate::driver::lines::ScriptedLines) and a `Vec<u8>`.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::driver::config::DriverConfig;
use crate::driver::lines::LineSource;
use crate::driver::result::SentResponse;
use crate::driver::rules::{Milestone, RuleSet, TriggerRule};
use crate::errors::Result;

pub struct Responder<W> {
    rules: Vec<TriggerRule>,
    rule_set: RuleSet,
    milestones: Vec<Milestone>,
    milestone_set: RuleSet,
    /// `None` until attached, and again after a failed write.
    writer: Option<W>,
    echo_stdout: bool,
    lines: Vec<String>,
    responses: Vec<SentResponse>,
    reached: Vec<usize>,
}

/// What a responder accumulated over its lifetime.
#[derive(Debug)]
pub struct ResponderOutput<W> {
    pub lines: Vec<String>,
    pub responses: Vec<SentResponse>,
    pub milestones: Vec<String>,
    pub writer: Option<W>,
}

impl<W> Responder<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Compile the config's rules; the writer is attached once the child
    /// exists.
    pub fn new(config: &DriverConfig) -> Result<Self> {
        let mut responder = Self::from_parts(
            config.rules.clone(),
            config.milestones.clone(),
            config.case_insensitive,
        )?;
        responder.echo_stdout = config.echo_stdout;
        Ok(responder)
    }

    pub fn from_parts(
        rules: Vec<TriggerRule>,
        milestones: Vec<Milestone>,
        case_insensitive: bool,
    ) -> Result<Self> {
        let rule_set = RuleSet::for_rules(&rules, case_insensitive)?;
        let milestone_set = RuleSet::for_milestones(&milestones, case_insensitive)?;
        debug!(
            rules = rule_set.len(),
            milestones = milestone_set.len(),
            case_insensitive,
            "compiled matchers"
        );
        Ok(Self {
            rules,
            rule_set,
            milestones,
            milestone_set,
            writer: None,
            echo_stdout: false,
            lines: Vec::new(),
            responses: Vec::new(),
            reached: Vec::new(),
        })
    }

    pub fn attach(&mut self, writer: W) {
        self.writer = Some(writer);
    }

    pub fn with_writer(mut self, writer: W) -> Self {
        self.attach(writer);
        self
    }

    /// Record one line, note milestones, and answer it with the first
    /// matching rule.
    ///
    /// Returns the index of the rule whose response was written.
    pub async fn handle_line(&mut self, line: String) -> Option<usize> {
        let line_index = self.lines.len();
        debug!(line_index, "stdout: {}", line);
        if self.echo_stdout {
            println!("{line}");
        }

        if !self.milestone_set.is_empty() {
            for idx in self.milestone_set.matches(&line) {
                if !self.reached.contains(&idx) {
                    info!(milestone = %self.milestones[idx].message, line_index, "milestone reached");
                    self.reached.push(idx);
                }
            }
        }

        let fired = self.rule_set.first_match(&line);
        self.lines.push(line);

        let rule_index = fired?;
        let rule = &self.rules[rule_index];
        let name = rule.display_name(rule_index);
        let payload = rule.payload();
        info!(
            rule = %name,
            line_index,
            response = %rule.loggable_response(),
            "prompt matched; sending response"
        );

        if self.write(payload.as_bytes()).await {
            self.responses.push(SentResponse {
                line_index,
                rule_index,
            });
            Some(rule_index)
        } else {
            None
        }
    }

    /// Write caller-provided text to the child's stdin.
    pub async fn send(&mut self, text: &str) -> bool {
        self.write(text.as_bytes()).await
    }

    /// Flush and close the child's stdin. Later writes are dropped.
    pub async fn close_stdin(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            debug!("closing child stdin");
            if let Err(e) = writer.shutdown().await {
                warn!(error = %e, "failed to close child stdin");
            }
        }
    }

    /// Feed every line of `source` through [`Self::handle_line`] until it ends.
    pub async fn drive<S>(&mut self, source: &mut S) -> io::Result<()>
    where
        S: LineSource + ?Sized,
    {
        while let Some(line) = source.next_line().await? {
            self.handle_line(line).await;
        }
        Ok(())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn responses(&self) -> &[SentResponse] {
        &self.responses
    }

    pub fn writer(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    pub fn into_output(self) -> ResponderOutput<W> {
        let milestones = self
            .reached
            .iter()
            .map(|&idx| self.milestones[idx].message.clone())
            .collect();
        ResponderOutput {
            lines: self.lines,
            responses: self.responses,
            milestones,
            writer: self.writer,
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            warn!("child stdin is not available; dropping write");
            return false;
        };

        let res = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        match res {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to write to child stdin; closing it");
                self.writer = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::lines::ScriptedLines;

    fn responder(rules: Vec<TriggerRule>, ci: bool) -> Responder<Vec<u8>> {
        Responder::from_parts(rules, Vec::new(), ci)
            .expect("responder")
            .with_writer(Vec::new())
    }

    fn written(r: &Responder<Vec<u8>>) -> String {
        String::from_utf8(r.writer().cloned().unwrap_or_default()).unwrap()
    }

    #[tokio::test]
    async fn answers_each_matching_line_once() {
        let mut r = responder(vec![TriggerRule::new(["Generate a new Android Keystore"], "y")], false);
        let mut lines = ScriptedLines::new([
            "Resolved build profile",
            "Generate a new Android Keystore?",
            "Uploading",
            "Generate a new Android Keystore?",
        ]);

        r.drive(&mut lines).await.unwrap();

        assert_eq!(written(&r), "y\ny\n");
        assert_eq!(
            r.responses(),
            &[
                SentResponse { line_index: 1, rule_index: 0 },
                SentResponse { line_index: 3, rule_index: 0 },
            ]
        );
        assert_eq!(r.lines().len(), 4);
    }

    #[tokio::test]
    async fn only_first_matching_rule_responds() {
        let mut r = responder(
            vec![
                TriggerRule::new(["Would you like"], "first"),
                TriggerRule::new(["create a project"], "second"),
            ],
            false,
        );
        let mut lines = ScriptedLines::new(["Would you like to create a project?", "create a project now"]);

        r.drive(&mut lines).await.unwrap();

        assert_eq!(written(&r), "first\nsecond\n");
    }

    #[tokio::test]
    async fn milestones_are_recorded_once_and_never_write() {
        let mut r = Responder::from_parts(
            Vec::new(),
            vec![Milestone::new(["Build started", "Build link:"], "build initiated")],
            false,
        )
        .unwrap()
        .with_writer(Vec::new());
        let mut lines = ScriptedLines::new(["Build started", "Build link: https://expo.dev/x"]);

        r.drive(&mut lines).await.unwrap();

        let out = r.into_output();
        assert_eq!(out.milestones, vec!["build initiated".to_string()]);
        assert!(out.responses.is_empty());
        assert_eq!(out.writer, Some(Vec::new()));
    }

    #[tokio::test]
    async fn caller_writes_share_the_writer() {
        let mut r = responder(vec![TriggerRule::new(["?"], "y").without_newline()], false);
        assert!(r.send("hello\n").await);
        r.handle_line("ok?".to_string()).await;
        assert_eq!(written(&r), "hello\ny");
    }

    #[tokio::test]
    async fn closed_stdin_drops_later_responses() {
        let mut r = responder(vec![TriggerRule::new(["Continue?"], "y")], false);
        assert!(r.send("y\n").await);
        r.close_stdin().await;

        assert!(r.writer().is_none());
        assert_eq!(r.handle_line("Continue?".to_string()).await, None);
        assert!(!r.send("late\n").await);
        assert!(r.responses().is_empty());
        assert_eq!(r.lines(), &["Continue?".to_string()]);
    }
}
