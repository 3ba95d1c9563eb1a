//! External coding agent adapter.
//!
//! The agent is an opaque CLI: it receives the instruction payload (on stdin
//! or as a trailing argument), edits files in the working directory and
//! exits. Its exit code is informational only.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::AgentSettings;
use crate::domain::error::{EvalError, Result};

/// Exit code reported when the agent was killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Captured output of one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl AgentOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// A coding agent invoked synchronously against a working directory.
#[async_trait]
pub trait CodingAgent: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run the agent with `prompt` in `work_dir`.
    ///
    /// Only failures to launch the agent are errors; a non-zero exit or a
    /// timeout is reported through [`AgentOutput`].
    async fn invoke(&self, prompt: &str, work_dir: &Path) -> Result<AgentOutput>;
}

/// [`CodingAgent`] that shells out to a command-line agent.
#[derive(Debug, Clone)]
pub struct CliAgent {
    command: String,
    args: Vec<String>,
    prompt_via_stdin: bool,
    timeout: Duration,
    env: BTreeMap<String, String>,
}

impl CliAgent {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            prompt_via_stdin: true,
            timeout: Duration::from_secs(600),
            env: BTreeMap::new(),
        }
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            command: settings.command.clone(),
            args: settings.args.clone(),
            prompt_via_stdin: settings.prompt_via_stdin,
            timeout: Duration::from_secs(settings.timeout_secs),
            env: settings.env.clone(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Pass the prompt on stdin (true) or as the last argument (false).
    pub fn with_stdin(mut self, prompt_via_stdin: bool) -> Self {
        self.prompt_via_stdin = prompt_via_stdin;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CodingAgent for CliAgent {
    fn name(&self) -> &str {
        &self.command
    }

    async fn invoke(&self, prompt: &str, work_dir: &Path) -> Result<AgentOutput> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.command);
        cmd.current_dir(work_dir)
            .args(&self.args)
            .envs(&self.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.prompt_via_stdin {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null()).arg(prompt);
        }

        info!(agent = %self.command, dir = %work_dir.display(), "Invoking coding agent");

        let mut child = cmd
            .spawn()
            .map_err(|e| EvalError::Agent(format!("failed to spawn {}: {e}", self.command)))?;

        if self.prompt_via_stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(prompt.as_bytes())
                    .await
                    .map_err(|e| EvalError::Agent(format!("failed to write prompt: {e}")))?;
                stdin.shutdown().await.ok();
            }
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| EvalError::Agent(format!("agent process error: {e}")))?
            }
            Err(_) => {
                warn!(
                    agent = %self.command,
                    timeout_secs = self.timeout.as_secs(),
                    "Agent timed out"
                );
                return Ok(AgentOutput {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout: String::new(),
                    stderr: format!("agent timed out after {} seconds", self.timeout.as_secs()),
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
        };

        let result = AgentOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        debug!(
            agent = %self.command,
            exit_code = result.exit_code,
            stdout = %result.stdout,
            stderr = %result.stderr,
            "Agent output"
        );
        if !result.succeeded() {
            warn!(
                agent = %self.command,
                exit_code = result.exit_code,
                "Agent exited non-zero; verifying anyway"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prompt_is_delivered_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CliAgent::new("cat");
        let output = agent.invoke("build the page", dir.path()).await.unwrap();
        assert!(output.succeeded());
        assert_eq!(output.stdout, "build the page");
    }

    #[tokio::test]
    async fn prompt_as_trailing_argument() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CliAgent::new("echo")
            .with_args(vec!["-n".to_string()])
            .with_stdin(false);
        let output = agent.invoke("hello", dir.path()).await.unwrap();
        assert_eq!(output.stdout, "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CliAgent::new("false");
        let output = agent.invoke("anything", dir.path()).await.unwrap();
        assert!(!output.succeeded());
    }

    #[tokio::test]
    async fn timeout_is_reported_as_output() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CliAgent::new("sleep")
            .with_args(vec!["5".to_string()])
            .with_timeout(Duration::from_millis(100));
        let output = agent.invoke("", dir.path()).await.unwrap();
        assert_eq!(output.exit_code, TIMEOUT_EXIT_CODE);
        assert!(output.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CliAgent::new("definitely-not-an-agent-binary");
        let err = agent.invoke("x", dir.path()).await.unwrap_err();
        assert!(matches!(err, EvalError::Agent(_)));
    }
}
