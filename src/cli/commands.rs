//! CLI command definitions for fix-forge.
//!
//! A single `run` command loads tasks, connects the sandbox and the model,
//! drives every task through the repair loop and writes the results.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::execution::{DockerSandbox, SandboxConfig, DEFAULT_IMAGE, DEFAULT_TIMEOUT_SECONDS};
use crate::llm::{LiteLlmClient, LlmProvider, OpenRouterProvider, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::metrics;
use crate::repair::{RepairAgent, RepairConfig, RepairLoop, DEFAULT_MAX_STEPS, DEFAULT_TEMPERATURE};
use crate::task::load_jsonl;

/// Default task source.
const DEFAULT_DATA: &str = "humanevalfix_python.jsonl";

/// Default results artifact.
const DEFAULT_OUTPUT: &str = "agent_results.json";

/// Iterative LLM bug-repair evaluation with sandboxed test execution.
#[derive(Parser)]
#[command(name = "fix-forge")]
#[command(about = "Evaluate LLM bug repair with sandboxed test execution")]
#[command(version)]
#[command(
    long_about = "fix-forge asks a language model to repair buggy Python functions, runs every candidate against the task's tests in an isolated Docker container, and reports how many tasks were fixed on the first attempt.\n\nExample usage:\n  fix-forge run --data humanevalfix_python.jsonl --model qwen3:0.6b --limit 10"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the repair evaluation over a JSONL task source.
    #[command(alias = "eval")]
    Run(RunArgs),
}

/// Arguments for `fix-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Model identifier passed to the provider.
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// JSONL task source.
    #[arg(short = 'd', long, default_value = DEFAULT_DATA)]
    pub data: PathBuf,

    /// Read at most this many lines of the task source.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Maximum repair steps per task.
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: u32,

    /// Print truncated baseline and failing transcripts.
    #[arg(long)]
    pub debug: bool,

    /// Print each truncated candidate.
    #[arg(long)]
    pub show_code: bool,

    /// Results artifact path.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Wall-clock timeout per sandbox execution, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// Docker image providing the Python runtime.
    #[arg(long, default_value = DEFAULT_IMAGE)]
    pub image: String,

    /// Sampling temperature.
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f64,

    /// Cap on generated tokens per request.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Base URL of an OpenAI-compatible endpoint (Ollama, LiteLLM, vLLM).
    #[arg(long, env = "LLM_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// OpenRouter API key. When set, requests go to OpenRouter.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Write Prometheus metrics in text format to this file.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

impl RunArgs {
    fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::new()
            .with_image(&self.image)
            .with_timeout(self.timeout)
    }

    fn repair_config(&self) -> RepairConfig {
        RepairConfig::new()
            .with_max_steps(self.max_steps)
            .with_timeout(self.timeout)
            .with_debug(self.debug)
            .with_show_code(self.show_code)
    }

    fn llm_provider(&self) -> Arc<dyn LlmProvider> {
        match self.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => {
                info!(model = %self.model, "Using OpenRouter provider");
                Arc::new(OpenRouterProvider::with_model(
                    key.to_string(),
                    self.model.clone(),
                ))
            }
            None => {
                info!(model = %self.model, api_base = %self.api_base, "Using OpenAI-compatible endpoint");
                Arc::new(LiteLlmClient::new(
                    self.api_base.clone(),
                    None,
                    self.model.clone(),
                ))
            }
        }
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_repair_command(args).await,
    }
}

async fn run_repair_command(args: RunArgs) -> anyhow::Result<()> {
    // Load errors are fatal before any task runs.
    let tasks = load_jsonl(&args.data, args.limit)
        .with_context(|| format!("Failed to load tasks from {}", args.data.display()))?;
    if tasks.is_empty() {
        warn!(path = %args.data.display(), "Task source contained no tasks");
    }
    info!(count = tasks.len(), "Loaded tasks for evaluation");

    if args.metrics_out.is_some() {
        metrics::init_metrics().context("Failed to initialize metrics")?;
    }

    let sandbox = DockerSandbox::connect(args.sandbox_config())
        .await
        .context("Failed to prepare the Docker sandbox")?;

    let mut agent =
        RepairAgent::new(args.llm_provider(), args.model.clone()).with_temperature(args.temperature);
    if let Some(max_tokens) = args.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }

    let repair = RepairLoop::new(agent, Arc::new(sandbox), args.repair_config())?;
    let results = repair.run_all(&tasks).await.context("Evaluation aborted")?;

    let summary = results.summary();
    println!(
        "\nSummary: {}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
    );

    results
        .write_json(&args.output)
        .with_context(|| format!("Failed to write results to {}", args.output.display()))?;
    println!("Saved results to {}", display_path(&args.output));

    if let Some(path) = &args.metrics_out {
        fs::write(path, metrics::export_metrics())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "Metrics written");
    }

    Ok(())
}

fn display_path(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse_run(args: &[&str]) -> RunArgs {
        let mut argv = vec!["fix-forge", "run"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).expect("should parse");
        match cli.command {
            Commands::Run(args) => args,
        }
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_defaults() {
        let args = parse_run(&[]);

        assert_eq!(args.model, "qwen3:0.6b");
        assert_eq!(args.data, PathBuf::from("humanevalfix_python.jsonl"));
        assert!(args.limit.is_none());
        assert_eq!(args.max_steps, 3);
        assert!(!args.debug);
        assert!(!args.show_code);
        assert_eq!(args.output, PathBuf::from("agent_results.json"));
        assert_eq!(args.timeout, 12);
        assert_eq!(args.image, "python:3.12-slim");
        assert_eq!(args.temperature, 0.2);
        assert!(args.metrics_out.is_none());
    }

    #[test]
    fn test_run_command_with_options() {
        let args = parse_run(&[
            "-m",
            "qwen3:8b",
            "--data",
            "tasks.jsonl",
            "--limit",
            "10",
            "--max-steps",
            "5",
            "--debug",
            "--show-code",
            "-o",
            "out.json",
            "--timeout",
            "30",
            "--api-base",
            "http://gpu-box:8000/v1",
            "--metrics-out",
            "metrics.prom",
        ]);

        assert_eq!(args.model, "qwen3:8b");
        assert_eq!(args.limit, Some(10));
        assert_eq!(args.max_steps, 5);
        assert!(args.debug && args.show_code);
        assert_eq!(args.output, PathBuf::from("out.json"));
        assert_eq!(args.api_base, "http://gpu-box:8000/v1");
        assert_eq!(args.metrics_out, Some(PathBuf::from("metrics.prom")));

        let repair = args.repair_config();
        assert_eq!(repair.max_steps, 5);
        assert_eq!(repair.timeout_seconds, Some(30));
        assert!(repair.debug);

        let sandbox = args.sandbox_config();
        assert_eq!(sandbox.limits.timeout_seconds, 30);
        assert_eq!(sandbox.image, "python:3.12-slim");
    }

    #[test]
    fn test_eval_alias() {
        let cli = Cli::try_parse_from(["fix-forge", "eval", "--limit", "2"])
            .expect("should parse with alias");
        match cli.command {
            Commands::Run(args) => assert_eq!(args.limit, Some(2)),
        }
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["fix-forge", "run", "--log-level", "debug"])
            .expect("should parse");
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_invalid_max_steps_rejected_by_parser() {
        let result = Cli::try_parse_from(["fix-forge", "run", "--max-steps", "many"]);
        assert!(result.is_err());
    }
}
