// src/driver/runner.rs

//! Process lifecycle for one driver run.
//!
//! A single `tokio::select!` loop owns the child and reacts to:
//! - the child exiting,
//! - the deadline passing,
//! - caller commands from a [`DriverHandle`],
//! - stdout lines (handed to the [`Responder`]),
//! - the post-exit drain window expiring.
//!
//! Because every event is handled by the same loop, line events are never
//! interleaved and all stdin writes are serialized. Exit is polled before the
//! deadline (`biased`), and the [`TerminationLatch`] records whichever
//! terminal reason is settled first.

use std::io;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::process::{Child, ChildStderr, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::driver::config::DriverConfig;
use crate::driver::latch::TerminationLatch;
use crate::driver::lines::{ChildLines, LineSource};
use crate::driver::responder::Responder;
use crate::driver::result::DriverResult;
use crate::errors::{PromptdriveError, Result};
use crate::types::{StderrMode, TerminationReason};

/// Requests a caller can make while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    /// Write raw text to the child's stdin.
    Send(String),
    /// Close the child's stdin so it sees end of input.
    CloseStdin,
    /// Kill the child; the run ends as `Cancelled`.
    Kill,
}

/// Caller side of a spawned run.
///
/// Dropping every handle does not stop the run; the timeout still applies.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<DriverCommand>,
}

impl DriverHandle {
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.command(DriverCommand::Send(text.into())).await
    }

    pub async fn send_line(&self, line: impl Into<String>) -> Result<()> {
        let mut text = line.into();
        text.push('\n');
        self.send(text).await
    }

    pub async fn close_stdin(&self) -> Result<()> {
        self.command(DriverCommand::CloseStdin).await
    }

    pub async fn kill(&self) -> Result<()> {
        self.command(DriverCommand::Kill).await
    }

    async fn command(&self, cmd: DriverCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| PromptdriveError::Other(anyhow!("driver is no longer running")))
    }
}

/// One configured run of an interactive process.
#[derive(Debug, Clone)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run to completion without caller control.
    pub async fn run(self) -> DriverResult {
        drive(self.config, None).await
    }

    /// Run as a background task and return a handle for writes and kill.
    pub fn spawn(self) -> (DriverHandle, JoinHandle<DriverResult>) {
        let (tx, rx) = mpsc::channel::<DriverCommand>(16);
        let join = tokio::spawn(drive(self.config, Some(rx)));
        (DriverHandle { tx }, join)
    }
}

/// Launch `config.spec`, answer prompts, and report how it ended.
pub async fn run(config: DriverConfig) -> DriverResult {
    Driver::new(config).run().await
}

async fn drive(
    config: DriverConfig,
    mut control: Option<mpsc::Receiver<DriverCommand>>,
) -> DriverResult {
    let started = Instant::now();
    let latch = TerminationLatch::new();

    info!(
        command = %config.spec.command,
        args = ?config.spec.args,
        env = ?config.spec.env_keys(),
        timeout_ms = config.timeout.as_millis() as u64,
        "launching interactive process"
    );

    let mut responder = match config
        .validate()
        .and_then(|()| Responder::<ChildStdin>::new(&config))
    {
        Ok(r) => r,
        Err(e) => {
            latch.settle(TerminationReason::LaunchFailed);
            error!(command = %config.spec.command, error = %e, "refusing to launch");
            return DriverResult::launch_failed(e.to_string(), started.elapsed());
        }
    };

    let mut child = match config.spec.to_command().spawn() {
        Ok(child) => child,
        Err(e) => {
            latch.settle(TerminationReason::LaunchFailed);
            let msg = format!("failed to launch '{}': {e}", config.spec.command);
            error!(command = %config.spec.command, error = %e, "launch failed");
            return DriverResult::launch_failed(msg, started.elapsed());
        }
    };

    let pid = child.id();
    info!(?pid, "process started");
    // `validate` bounds the timeout, so this only misses for a config
    // mutated after the check; such a run simply has no deadline.
    let deadline = started.checked_add(config.timeout);

    if let Some(stdin) = child.stdin.take() {
        responder.attach(stdin);
    }

    let captured_err = Arc::new(Mutex::new(Vec::new()));
    let mut stderr_task = child
        .stderr
        .take()
        .map(|stderr| spawn_stderr_pump(stderr, config.stderr, Arc::clone(&captured_err)));

    let mut stdout: Option<Box<dyn LineSource>> = child
        .stdout
        .take()
        .map(|out| Box::new(ChildLines::new(out)) as Box<dyn LineSource>);

    for line in &config.initial_input {
        debug!("writing initial input line");
        responder.send(&format!("{line}\n")).await;
    }
    if config.close_stdin {
        responder.close_stdin().await;
    }

    let mut status: Option<ExitStatus> = None;
    let mut drain_until = started;
    let mut failure: Option<String> = None;

    loop {
        tokio::select! {
            biased;

            res = child.wait(), if status.is_none() => {
                match res {
                    Ok(exit) => {
                        latch.settle(TerminationReason::Exited);
                        debug!(code = ?exit.code(), "process exited; draining stdout");
                        status = Some(exit);
                    }
                    Err(e) => {
                        latch.settle(TerminationReason::Exited);
                        error!(error = %e, "failed waiting for process");
                        failure = Some(format!("waiting for process: {e}"));
                        break;
                    }
                }
                if stdout.is_none() {
                    break;
                }
                drain_until = Instant::now()
                    .checked_add(config.drain_grace)
                    .unwrap_or_else(Instant::now);
            }

            _ = sleep_until_opt(deadline), if status.is_none() => {
                if latch.settle(TerminationReason::TimedOut) {
                    warn!(
                        ?pid,
                        timeout_ms = config.timeout.as_millis() as u64,
                        "timeout reached; killing process"
                    );
                    status = kill_and_reap(&mut child).await;
                }
                break;
            }

            cmd = next_command(&mut control) => match cmd {
                Some(DriverCommand::Send(text)) => {
                    responder.send(&text).await;
                }
                Some(DriverCommand::CloseStdin) => {
                    responder.close_stdin().await;
                }
                Some(DriverCommand::Kill) => {
                    if status.is_none() && latch.settle(TerminationReason::Cancelled) {
                        info!(?pid, "kill requested by caller");
                        status = kill_and_reap(&mut child).await;
                        break;
                    }
                    debug!("kill requested after exit; ignoring");
                }
                None => {
                    debug!("all driver handles dropped");
                    control = None;
                }
            },

            line = next_line(&mut stdout) => match line {
                Ok(Some(line)) => {
                    responder.handle_line(line).await;
                }
                Ok(None) => {
                    debug!("stdout closed");
                    stdout = None;
                    if status.is_some() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed reading stdout; no further prompts will be answered");
                    failure.get_or_insert_with(|| format!("reading stdout: {e}"));
                    stdout = None;
                    if status.is_some() {
                        break;
                    }
                }
            },

            _ = sleep_until(drain_until), if status.is_some() => {
                debug!("stdout still open after exit; stopping drain");
                break;
            }
        }
    }

    if let Some(task) = stderr_task.as_mut() {
        match tokio::time::timeout(config.drain_grace, &mut *task).await {
            Ok(Ok(Some(e))) => {
                failure.get_or_insert_with(|| format!("reading stderr: {e}"));
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!(error = %e, "stderr reader task failed"),
            Err(_) => {
                debug!("stderr still open; detaching reader");
                task.abort();
            }
        }
    }

    let termination_reason = latch.reason().unwrap_or(TerminationReason::Exited);
    let exit_code = status.and_then(|s| s.code());
    let captured_error_lines = match captured_err.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    let output = responder.into_output();

    info!(
        reason = %termination_reason,
        exit_code = ?exit_code,
        lines = output.lines.len(),
        responses = output.responses.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "driver finished"
    );

    DriverResult {
        exit_code,
        termination_reason,
        captured_output_lines: output.lines,
        captured_error_lines,
        responses: output.responses,
        milestones: output.milestones,
        error: failure,
        duration: started.elapsed(),
    }
}

/// Non-graceful kill, then reap so the exit status is available.
async fn kill_and_reap(child: &mut Child) -> Option<ExitStatus> {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
    match child.try_wait() {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "failed to collect exit status after kill");
            None
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_command(
    control: &mut Option<mpsc::Receiver<DriverCommand>>,
) -> Option<DriverCommand> {
    match control {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_line(source: &mut Option<Box<dyn LineSource>>) -> io::Result<Option<String>> {
    match source {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

/// Consume stderr so the pipe never fills. Lines are never matched.
///
/// Resolves to the read error that ended the pump, if any.
fn spawn_stderr_pump(
    stderr: ChildStderr,
    mode: StderrMode,
    captured: Arc<Mutex<Vec<String>>>,
) -> JoinHandle<Option<String>> {
    tokio::spawn(async move {
        let mut lines = ChildLines::new(stderr);
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "failed reading stderr");
                    return Some(e.to_string());
                }
            };
            match mode {
                StderrMode::Forward => eprintln!("{line}"),
                StderrMode::Capture => match captured.lock() {
                    Ok(mut guard) => guard.push(line),
                    Err(poisoned) => poisoned.into_inner().push(line),
                },
                StderrMode::Discard => debug!("stderr: {}", line),
            }
        }
    })
}
