// src/driver/mod.rs

//! Interactive process driver.
//!
//! Launches an external command, watches its stdout line by line, answers
//! known prompts with canned responses, and guarantees termination through a
//! wall-clock timeout.
//!
//! - [`process`] describes what to launch (`ProcessSpec`).
//! - [`rules`] holds trigger rules, milestones and the compiled matcher.
//! - [`config`] bundles everything into a `DriverConfig` (builder-style).
//! - [`lines`] abstracts output as a `LineSource`, so matching can be tested
//!   on synthetic input.
//! - [`responder`] applies first-match-wins to each line and owns stdin.
//! - [`latch`] is the single authoritative terminal-state flag.
//! - [`runner`] owns the child and the event loop; [`result`] is what it
//!   reports back.

pub mod config;
pub mod latch;
pub mod lines;
pub mod process;
pub mod responder;
pub mod result;
pub mod rules;
pub mod runner;

pub use config::{DEFAULT_DRAIN_GRACE, DriverConfig, DriverConfigBuilder, MAX_DURATION};
pub use latch::TerminationLatch;
pub use lines::{ChildLines, LineSource, ScriptedLines};
pub use process::ProcessSpec;
pub use responder::Responder;
pub use result::{DriverResult, SentResponse};
pub use rules::{Matcher, Milestone, RuleSet, TriggerRule};
pub use runner::{Driver, DriverCommand, DriverHandle, run};
pub use crate::types::{StderrMode, TerminationReason};
