//! next-evals - evaluate a coding agent against a Next.js project
//!
//! ```text
//! next-evals                      # usage and available evals
//! next-evals 003-add-route        # single-shot run of one eval
//! next-evals 003 --full           # retry with feedback, prefix match
//! next-evals --all --output results.json
//! ```
//!
//! Evaluation failures are reported in the result table and the optional
//! JSON summary; they never change the exit code.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use next_evals_core::{
    render_table, write_summary_json, AttemptOutcome, BatchSummary, CliAgent, Config,
    DevServerMonitor, EvalCatalog, GitWorkingTree, LoadedEval, RunMode,
};
use next_evals_runner::{CommandVerifier, GatePolicy, GateSet, Harness, HarnessSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "next-evals")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate a coding agent on Next.js tasks", long_about = None)]
struct Cli {
    /// Eval to run (directory name or unique prefix)
    eval: Option<String>,

    /// Run every discovered eval
    #[arg(long, conflicts_with = "eval")]
    all: bool,

    /// Retry with build/lint/test and runtime feedback
    #[arg(long)]
    full: bool,

    /// Echo agent and gate output
    #[arg(long)]
    debug: bool,

    /// Write a JSON summary array to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (default: nearest next-evals.toml)
    #[arg(long, env = "NEXT_EVALS_CONFIG")]
    config: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,

    /// Directory for per-run attempt logs
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Maximum attempts in --full mode
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Directory containing the evals
    #[arg(long)]
    evals_dir: Option<PathBuf>,

    /// Next.js project the agent works in
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Agent executable
    #[arg(long, env = "NEXT_EVALS_AGENT")]
    agent: Option<String>,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.full {
            RunMode::RetryWithFeedback
        } else {
            RunMode::SingleShot
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    next_evals_core::init_tracing(cli.json_logs, level);

    let config = load_config(&cli)?;
    let catalog = EvalCatalog::discover(&config.paths.evals_dir).with_context(|| {
        format!(
            "Failed to read evals directory {}",
            config.paths.evals_dir.display()
        )
    })?;

    let Some(evals) = select_evals(&cli, &catalog)? else {
        print!("{}", usage_text(&catalog));
        return Ok(());
    };

    let harness = build_harness(&cli, &config)?;
    info!(
        evals = evals.len(),
        mode = %harness.settings().mode,
        "Starting evaluation"
    );
    let outcomes = harness.run_loaded(&evals).await;

    print_report(&outcomes);
    if let Some(path) = &cli.output {
        write_summary_json(&outcomes, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Results written to {}", path.display());
    }

    Ok(())
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config =
        Config::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(max_attempts) = cli.max_attempts {
        config.run.max_attempts = max_attempts;
    }
    if let Some(dir) = &cli.evals_dir {
        config.paths.evals_dir = dir.clone();
    }
    if let Some(dir) = &cli.project_dir {
        config.paths.project_dir = dir.clone();
    }
    if let Some(agent) = &cli.agent {
        config.agent.command = agent.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Evals requested on the command line; `None` when nothing was asked for.
///
/// An unknown identifier is an error. Evals that fail to load are kept so
/// each one still produces an outcome.
fn select_evals(cli: &Cli, catalog: &EvalCatalog) -> Result<Option<Vec<LoadedEval>>> {
    if cli.all {
        return Ok(Some(catalog.load_each()));
    }

    match &cli.eval {
        Some(id) => {
            let loaded = catalog
                .load_one(id)
                .with_context(|| format!("Unknown eval '{id}'"))?;
            Ok(Some(vec![loaded]))
        }
        None => Ok(None),
    }
}

fn usage_text(catalog: &EvalCatalog) -> String {
    let mut out = format!("{}\n", Cli::command().render_usage());
    if catalog.is_empty() {
        out.push_str("\nNo evals found.\n");
    } else {
        out.push_str("\nAvailable evals:\n");
        for id in catalog.ids() {
            out.push_str(&format!("  {id}\n"));
        }
    }
    out
}

fn build_harness(cli: &Cli, config: &Config) -> Result<Harness> {
    let project_dir = absolute(&config.paths.project_dir)?;
    let tree = GitWorkingTree::open(&project_dir)
        .with_context(|| format!("{} is not a git working tree", project_dir.display()))?;

    let verifier = CommandVerifier::new(
        GateSet::from_settings(&config.gates),
        GatePolicy::from_flag(config.run.stop_on_first_failure),
    );

    let settings = HarnessSettings {
        mode: cli.mode(),
        max_attempts: config.run.max_attempts,
        artifacts_dir: cli.artifacts.clone(),
    };

    Ok(Harness::new(
        Arc::new(CliAgent::from_settings(&config.agent)),
        Arc::new(verifier),
        Arc::new(tree),
        settings,
    )
    .with_monitor(Arc::new(DevServerMonitor::new(config.monitor.clone()))))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn print_report(outcomes: &[AttemptOutcome]) {
    println!();
    print!("{}", render_table(outcomes));
    println!();
    println!("{}", BatchSummary::from_outcomes(outcomes).render());
}
