//! Configuration management for `next-evals.toml`.
//!
//! Every field is optional; defaults reproduce a stock Next.js project driven
//! by the `claude` CLI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{EvalError, Result};

/// Config file searched for in the current directory and its parents.
pub const CONFIG_FILE: &str = "next-evals.toml";

/// Placeholder substituted with the monitor port in its command.
pub const PORT_PLACEHOLDER: &str = "{port}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathSettings,
    pub run: RunSettings,
    pub agent: AgentSettings,
    pub gates: GateSettings,
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory holding one subdirectory per eval.
    pub evals_dir: PathBuf,

    /// Project checkout the agent edits.
    pub project_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            evals_dir: PathBuf::from("evals"),
            project_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub max_attempts: u32,

    /// Skip later gates once one fails.
    pub stop_on_first_failure: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            stop_on_first_failure: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub command: String,
    pub args: Vec<String>,
    pub prompt_via_stdin: bool,
    pub timeout_secs: u64,
    pub env: BTreeMap<String, String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec![
                "--print".to_string(),
                "--dangerously-skip-permissions".to_string(),
            ],
            prompt_via_stdin: true,
            timeout_secs: 600,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub build: Vec<String>,
    pub lint: Vec<String>,
    pub test: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            build: strings(&["npm", "run", "build"]),
            lint: strings(&["npm", "run", "lint"]),
            test: strings(&["npx", "vitest", "run"]),
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Dev server command; `{port}` is replaced with `port`.
    pub command: Vec<String>,
    pub port: u16,
    pub health_path: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub error_signatures: Vec<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            command: strings(&["npm", "run", "dev", "--", "--port", PORT_PLACEHOLDER]),
            port: 3000,
            health_path: "/".to_string(),
            poll_interval_ms: 1000,
            max_polls: 30,
            error_signatures: strings(&[
                "Error:",
                "TypeError",
                "ReferenceError",
                "SyntaxError",
                "Unhandled Runtime Error",
                "Module not found",
                "Failed to compile",
                "⨯",
            ]),
        }
    }
}

impl MonitorSettings {
    /// Command line with the port substituted.
    pub fn resolved_command(&self) -> Vec<String> {
        let port = self.port.to_string();
        self.command
            .iter()
            .map(|arg| arg.replace(PORT_PLACEHOLDER, &port))
            .collect()
    }

    pub fn health_url(&self) -> String {
        let path = if self.health_path.starts_with('/') {
            self.health_path.clone()
        } else {
            format!("/{}", self.health_path)
        };
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| EvalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EvalError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| EvalError::Config(format!("{}: {e}", path.display())))
    }

    /// Load `path` if given, else the nearest `next-evals.toml`, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::find_config_path(&std::env::current_dir()?) {
                Some(found) => Self::load_from(found),
                None => Ok(Self::default()),
            },
        }
    }

    /// Find `next-evals.toml` by searching `start` and its parents.
    pub fn find_config_path(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.max_attempts == 0 {
            return Err(EvalError::Config("run.max_attempts must be at least 1".to_string()));
        }
        if self.agent.command.trim().is_empty() {
            return Err(EvalError::Config("agent.command must not be empty".to_string()));
        }
        for (name, command) in [
            ("build", &self.gates.build),
            ("lint", &self.gates.lint),
            ("test", &self.gates.test),
        ] {
            if command.is_empty() {
                return Err(EvalError::Config(format!("gates.{name} must not be empty")));
            }
        }
        if self.monitor.command.is_empty() {
            return Err(EvalError::Config("monitor.command must not be empty".to_string()));
        }
        Ok(())
    }
}
