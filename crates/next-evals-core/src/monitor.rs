//! Dev-server monitor used in feedback mode.
//!
//! [`Monitor::start`] launches the dev server and polls its health endpoint
//! until it answers. The returned [`MonitorHandle`] is owned by the active
//! run: it yields runtime errors logged since the previous read and must be
//! stopped when the run ends.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::MonitorSettings;
use crate::domain::error::{EvalError, Result};
use crate::feedback::match_error_lines;

/// Log file name inside the handle's scratch directory.
pub const LOG_FILE: &str = "dev-server.log";

/// Grace period for the dev server to exit after being killed.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts a long-lived runtime monitor for one run.
#[async_trait]
pub trait Monitor: Send + Sync {
    async fn start(&self, work_dir: &Path) -> Result<Box<dyn MonitorHandle>>;
}

/// A running monitor owned by exactly one run.
#[async_trait]
pub trait MonitorHandle: Send {
    /// Error lines logged since the previous call.
    fn take_errors(&mut self) -> Result<Vec<String>>;

    /// Terminate the monitored process.
    async fn stop(self: Box<Self>) -> Result<()>;
}

/// [`Monitor`] that runs the project's dev server.
#[derive(Debug, Clone)]
pub struct DevServerMonitor {
    settings: MonitorSettings,
}

impl DevServerMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self { settings }
    }

    async fn wait_until_ready(&self, child: &mut Child) -> Result<()> {
        let interval = Duration::from_millis(self.settings.poll_interval_ms);
        let client = reqwest::Client::builder()
            .timeout(interval.max(Duration::from_millis(500)))
            .build()
            .map_err(|e| EvalError::Monitor(format!("failed to build http client: {e}")))?;
        let url = self.settings.health_url();

        for poll in 1..=self.settings.max_polls {
            if let Some(status) = child.try_wait()? {
                return Err(EvalError::Monitor(format!(
                    "dev server exited with {status} before becoming ready"
                )));
            }

            match client.get(&url).send().await {
                Ok(response) => {
                    info!(url = %url, status = %response.status(), poll, "Dev server ready");
                    return Ok(());
                }
                Err(e) => debug!(url = %url, poll, error = %e, "Dev server not ready yet"),
            }

            tokio::time::sleep(interval).await;
        }

        Err(EvalError::Monitor(format!(
            "dev server at {url} not ready after {} polls",
            self.settings.max_polls
        )))
    }
}

#[async_trait]
impl Monitor for DevServerMonitor {
    async fn start(&self, work_dir: &Path) -> Result<Box<dyn MonitorHandle>> {
        let command = self.settings.resolved_command();
        let (exe, args) = command
            .split_first()
            .ok_or_else(|| EvalError::Monitor("dev server command is empty".to_string()))?;

        let scratch = tempfile::tempdir()?;
        let log_path = scratch.path().join(LOG_FILE);
        let log = std::fs::File::create(&log_path)?;
        let log_err = log.try_clone()?;

        let mut child = Command::new(exe)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EvalError::Monitor(format!("failed to spawn {exe}: {e}")))?;

        info!(command = %command.join(" "), pid = ?child.id(), "Started dev server");

        if let Err(e) = self.wait_until_ready(&mut child).await {
            if let Err(kill_err) = child.kill().await {
                warn!(error = %kill_err, "Failed to kill dev server after failed start");
            }
            return Err(e);
        }

        Ok(Box::new(DevServerHandle {
            child,
            log: LogTail::new(log_path),
            signatures: self.settings.error_signatures.clone(),
            _scratch: scratch,
        }))
    }
}

/// Incremental reader over a log file that is still being written.
#[derive(Debug)]
struct LogTail {
    path: PathBuf,
    offset: u64,

    /// Bytes after the last newline, held until the line completes.
    pending: Vec<u8>,
}

impl LogTail {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            offset: 0,
            pending: Vec::new(),
        }
    }

    /// Lines completed since the previous call.
    fn read_complete_lines(&mut self) -> Result<String> {
        let mut file = std::fs::File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let read = file.read_to_end(&mut self.pending)?;
        self.offset += read as u64;

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(String::new());
        };
        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        Ok(String::from_utf8_lossy(&complete).into_owned())
    }
}

/// Handle to a running dev server and its log.
#[derive(Debug)]
pub struct DevServerHandle {
    child: Child,
    log: LogTail,
    signatures: Vec<String>,
    _scratch: tempfile::TempDir,
}

#[async_trait]
impl MonitorHandle for DevServerHandle {
    fn take_errors(&mut self) -> Result<Vec<String>> {
        let fresh = self.log.read_complete_lines()?;
        Ok(match_error_lines(&fresh, &self.signatures))
    }

    async fn stop(mut self: Box<Self>) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        self.child
            .start_kill()
            .map_err(|e| EvalError::Monitor(format!("failed to kill dev server: {e}")))?;

        match tokio::time::timeout(STOP_TIMEOUT, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(status = %status, "Dev server stopped");
                Ok(())
            }
            Err(_) => Err(EvalError::Monitor(format!(
                "dev server did not exit within {} seconds",
                STOP_TIMEOUT.as_secs()
            ))),
        }
    }
}
