//! Gate command execution.

use crate::gate::GateConfig;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Result of running one gate command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (0 = success, -1 = killed by signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandResult {
    /// Whether the command exited with code 0.
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Combined stdout and stderr, as fed back to the agent.
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Runs gate commands inside the working tree.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute a gate command in `work_dir` and capture its output.
    ///
    /// Spawn failures and timeouts are errors; a non-zero exit is not.
    pub async fn execute(config: &GateConfig, work_dir: &Path) -> anyhow::Result<CommandResult> {
        let start = Instant::now();

        let Some((exe, args)) = config.command.split_first() else {
            anyhow::bail!("Gate {} has empty command", config.gate);
        };

        let child = Command::new(exe)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Gate {} failed to spawn {}: {}", config.gate, exe, e))?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Gate {} timed out after {} seconds",
                    config.gate,
                    config.timeout_secs
                )
            })??
        } else {
            child.wait_with_output().await?
        };

        let result = CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        debug!(
            gate = %config.gate,
            command = %config.command_line(),
            exit_code = result.exit_code,
            stdout = %result.stdout,
            stderr = %result.stderr,
            "Gate output"
        );

        Ok(result)
    }
}
