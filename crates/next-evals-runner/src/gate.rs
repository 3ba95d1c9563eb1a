//! Verification gate definitions and configuration.

use std::fmt;

use next_evals_core::GateSettings;
use serde::{Deserialize, Serialize};

/// The three verification gates, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Production build, e.g. `npm run build`.
    Build,

    /// Static check, e.g. `npm run lint`.
    Lint,

    /// Test runner over the staged fixtures, e.g. `npx vitest run`.
    Test,
}

impl Gate {
    /// All gates in the fixed order build -> lint -> test.
    pub const ORDER: [Gate; 3] = [Gate::Build, Gate::Lint, Gate::Test];

    pub fn name(&self) -> &'static str {
        match self {
            Gate::Build => "build",
            Gate::Lint => "lint",
            Gate::Test => "test",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Command and timeout for one gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateConfig {
    pub gate: Gate,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds; zero disables the timeout.
    pub timeout_secs: u64,
}

impl GateConfig {
    pub fn new(gate: Gate, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            gate,
            command,
            timeout_secs,
        }
    }

    /// Human-readable command line.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// The configured build, lint and test gates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateSet {
    pub build: GateConfig,
    pub lint: GateConfig,
    pub test: GateConfig,
}

impl GateSet {
    pub fn from_settings(settings: &GateSettings) -> Self {
        Self {
            build: GateConfig::new(Gate::Build, settings.build.clone(), settings.timeout_secs),
            lint: GateConfig::new(Gate::Lint, settings.lint.clone(), settings.timeout_secs),
            test: GateConfig::new(Gate::Test, settings.test.clone(), settings.timeout_secs),
        }
    }

    pub fn get(&self, gate: Gate) -> &GateConfig {
        match gate {
            Gate::Build => &self.build,
            Gate::Lint => &self.lint,
            Gate::Test => &self.test,
        }
    }
}

impl Default for GateSet {
    fn default() -> Self {
        Self::from_settings(&GateSettings::default())
    }
}

/// What to do with later gates once one fails within an attempt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Run every gate for full diagnostics.
    #[default]
    RunAll,

    /// Skip the remaining gates after the first failure.
    StopOnFirstFailure,
}

impl GatePolicy {
    pub fn from_flag(stop_on_first_failure: bool) -> Self {
        if stop_on_first_failure {
            GatePolicy::StopOnFirstFailure
        } else {
            GatePolicy::RunAll
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_order_is_build_lint_test() {
        assert_eq!(Gate::ORDER, [Gate::Build, Gate::Lint, Gate::Test]);
        assert!(Gate::Build < Gate::Lint && Gate::Lint < Gate::Test);
    }

    #[test]
    fn gate_names() {
        assert_eq!(Gate::Build.name(), "build");
        assert_eq!(Gate::Lint.to_string(), "lint");
        assert_eq!(Gate::Test.name(), "test");
    }

    #[test]
    fn default_gate_set_uses_npm_scripts() {
        let gates = GateSet::default();
        assert_eq!(gates.get(Gate::Build).command_line(), "npm run build");
        assert_eq!(gates.get(Gate::Lint).command_line(), "npm run lint");
        assert_eq!(gates.get(Gate::Test).command_line(), "npx vitest run");
        assert_eq!(gates.get(Gate::Test).timeout_secs, 600);
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(GatePolicy::from_flag(false), GatePolicy::RunAll);
        assert_eq!(GatePolicy::from_flag(true), GatePolicy::StopOnFirstFailure);
        assert_eq!(GatePolicy::default(), GatePolicy::RunAll);
    }
}
