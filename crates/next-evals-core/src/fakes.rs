//! In-memory fakes for the external collaborators (testing only).
//!
//! Provides `ScriptedAgent`, `MemoryWorkingTree` and `ScriptedMonitor`, which
//! satisfy the trait contracts without spawning processes.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::{AgentOutput, CodingAgent};
use crate::domain::error::{EvalError, Result};
use crate::git::{Baseline, WorkingTree};
use crate::monitor::{Monitor, MonitorHandle};

// ---------------------------------------------------------------------------
// ScriptedAgent
// ---------------------------------------------------------------------------

/// Agent that records every prompt and optionally writes a file per call.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    prompts: Mutex<Vec<String>>,
    exit_code: i32,
    edit: Option<(PathBuf, String)>,
    fail_on_call: Option<usize>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Write `content` to `relative` inside the work dir on every call.
    pub fn with_edit(mut self, relative: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.edit = Some((relative.into(), content.into()));
        self
    }

    /// Return a launch error on the given 1-based call.
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CodingAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, prompt: &str, work_dir: &Path) -> Result<AgentOutput> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if self.fail_on_call == Some(call) {
            return Err(EvalError::Agent(format!("scripted failure on call {call}")));
        }

        if let Some((relative, content)) = &self.edit {
            let dest = work_dir.join(relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, content)?;
        }

        Ok(AgentOutput {
            exit_code: self.exit_code,
            stdout: format!("call {call}"),
            stderr: String::new(),
            duration_ms: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryWorkingTree
// ---------------------------------------------------------------------------

/// Counters shared between a `MemoryWorkingTree` and the test.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeCalls {
    pub set_aside: usize,
    pub restore: usize,
}

/// Working tree rooted at a plain directory that only counts calls.
#[derive(Debug)]
pub struct MemoryWorkingTree {
    root: PathBuf,
    calls: Mutex<TreeCalls>,
    fail_set_aside: bool,
    fail_restore: bool,
}

impl MemoryWorkingTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            calls: Mutex::new(TreeCalls::default()),
            fail_set_aside: false,
            fail_restore: false,
        }
    }

    pub fn failing_set_aside(mut self) -> Self {
        self.fail_set_aside = true;
        self
    }

    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    pub fn calls(&self) -> TreeCalls {
        *self.calls.lock().unwrap()
    }
}

impl WorkingTree for MemoryWorkingTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn set_aside(&self) -> Result<Baseline> {
        self.calls.lock().unwrap().set_aside += 1;
        if self.fail_set_aside {
            return Err(EvalError::GitError("scripted stash failure".to_string()));
        }
        Ok(Baseline {
            head: "0000000000000000000000000000000000000000".to_string(),
            stashed: false,
        })
    }

    fn restore(&self, _baseline: &Baseline) -> Result<()> {
        self.calls.lock().unwrap().restore += 1;
        if self.fail_restore {
            return Err(EvalError::GitError("scripted restore failure".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedMonitor
// ---------------------------------------------------------------------------

/// Lifecycle counters shared between a `ScriptedMonitor` and its handles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorCalls {
    pub started: usize,
    pub stopped: usize,
    pub drained: usize,
}

/// Monitor whose handles return pre-scripted error batches in order.
#[derive(Debug, Default)]
pub struct ScriptedMonitor {
    batches: Mutex<VecDeque<Vec<String>>>,
    calls: Arc<Mutex<MonitorCalls>>,
    fail_start: bool,
}

impl ScriptedMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the errors returned by the next `take_errors` call.
    pub fn with_errors(self, errors: Vec<String>) -> Self {
        self.batches.lock().unwrap().push_back(errors);
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn calls(&self) -> MonitorCalls {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Monitor for ScriptedMonitor {
    async fn start(&self, _work_dir: &Path) -> Result<Box<dyn MonitorHandle>> {
        self.calls.lock().unwrap().started += 1;
        if self.fail_start {
            return Err(EvalError::Monitor(
                "dev server not ready after 30 polls".to_string(),
            ));
        }
        let batches = std::mem::take(&mut *self.batches.lock().unwrap());
        Ok(Box::new(ScriptedMonitorHandle {
            batches,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedMonitorHandle {
    batches: VecDeque<Vec<String>>,
    calls: Arc<Mutex<MonitorCalls>>,
}

#[async_trait]
impl MonitorHandle for ScriptedMonitorHandle {
    fn take_errors(&mut self) -> Result<Vec<String>> {
        self.calls.lock().unwrap().drained += 1;
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    async fn stop(self: Box<Self>) -> Result<()> {
        self.calls.lock().unwrap().stopped += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_agent_records_prompts_and_edits() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ScriptedAgent::new().with_edit("app/page.tsx", "export default 1");
        agent.invoke("first", dir.path()).await.unwrap();
        agent.invoke("second", dir.path()).await.unwrap();

        assert_eq!(agent.prompts(), vec!["first", "second"]);
        assert!(dir.path().join("app/page.tsx").exists());
    }

    #[tokio::test]
    async fn scripted_monitor_drains_batches_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = ScriptedMonitor::new()
            .with_errors(vec!["TypeError: a".to_string()])
            .with_errors(vec![]);
        let mut handle = monitor.start(dir.path()).await.unwrap();
        assert_eq!(handle.take_errors().unwrap(), vec!["TypeError: a"]);
        assert!(handle.take_errors().unwrap().is_empty());
        assert!(handle.take_errors().unwrap().is_empty());
        handle.stop().await.unwrap();

        let calls = monitor.calls();
        assert_eq!(calls.started, 1);
        assert_eq!(calls.stopped, 1);
        assert_eq!(calls.drained, 3);
    }
}
