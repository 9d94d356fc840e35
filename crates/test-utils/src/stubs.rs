//! Stub child processes built from small `sh` scripts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use promptdrive::driver::{DriverConfig, DriverConfigBuilder, ProcessSpec};
use promptdrive::types::StderrMode;
use tempfile::TempDir;

/// `sh -c <script>` as a process spec.
pub fn sh(script: &str) -> ProcessSpec {
    ProcessSpec::new("sh").args(["-c", script])
}

/// Builder for a stub run with stderr captured, so test output stays quiet.
pub fn stub(script: &str, timeout: Duration) -> DriverConfigBuilder {
    DriverConfig::builder(sh(script), timeout).stderr(StderrMode::Capture)
}

/// A scratch directory plus a path inside it where a stub can write its pid.
pub struct PidFile {
    _dir: TempDir,
    path: PathBuf,
}

impl PidFile {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stub.pid");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shell snippet that records the stub's pid.
    pub fn record_snippet(&self) -> String {
        format!("echo $$ > '{}'", self.path.display())
    }

    pub fn read_pid(&self) -> anyhow::Result<u32> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(raw.trim().parse()?)
    }
}

/// Whether a process with this pid still exists (`kill -0`).
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("sh")
        .args(["-c", &format!("kill -0 {pid}")])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
