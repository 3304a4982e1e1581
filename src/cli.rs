//! CLI surface (§6). `--worker-job`/`--worker-result` are undocumented and
//! only ever set by the coordinator re-invoking this same binary as part of
//! its self-reexec process pool.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{AgentMode, RunConfig, RunSpec, ScenarioSelection, TaskFilter, TaskRegime};
use crate::error::EvalError;
use crate::models::scenario::AgentCountFilter;
use crate::models::TaskCategory;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliAgentType {
    Single,
    Multi,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliTaskType {
    Sequential,
    Combined,
    Independent,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliAgentCountFilter {
    Single,
    Multi,
    All,
}

#[derive(Parser, Debug)]
#[command(
    name = "embodied-eval",
    about = "Drives scripted embodied-task scenarios through an agent and records objective subtask completion"
)]
pub struct Cli {
    /// Selects a YAML configuration bundle (agent mode, dataset/output roots, defaults).
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub agent_type: Option<CliAgentType>,

    #[arg(long, value_enum)]
    pub task_type: Option<CliTaskType>,

    /// `all` | `<start>-<end>` | `<id>[,<id>...]`.
    #[arg(long)]
    pub scenarios: Option<String>,

    #[arg(long = "task-categories", num_args = 0..)]
    pub task_categories: Vec<String>,

    #[arg(long)]
    pub agent_count_filter: Option<CliAgentCountFilter>,

    #[arg(long)]
    pub parallel: Option<usize>,

    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Re-enter an existing run directory by name, skipping tasks its
    /// trajectories already finalized (supplemental crash-resume feature).
    #[arg(long)]
    pub resume: Option<String>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Dataset root; normally set via `--config`, overridable directly.
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    #[arg(long)]
    pub step_budget: Option<u32>,

    /// Internal worker-mode entry point; never set by a user directly.
    #[arg(long, hide = true)]
    pub worker_job: Option<PathBuf>,

    #[arg(long, hide = true)]
    pub worker_result: Option<PathBuf>,
}

impl Cli {
    pub fn is_worker_invocation(&self) -> bool {
        self.worker_job.is_some() || self.worker_result.is_some()
    }
}

/// Merges the config bundle (if any) with CLI overrides into a validated
/// `RunConfig` plus the raw `--scenarios` spec string for the selector.
pub fn build_run_config(cli: &Cli) -> Result<RunConfig, EvalError> {
    let bundle = RunConfig::load_bundle(cli.config.as_ref())?;

    let agent_mode = match cli.agent_type {
        Some(CliAgentType::Single) => AgentMode::Single,
        Some(CliAgentType::Multi) => bundle.agent_mode.unwrap_or(AgentMode::CentralizedMulti),
        None => bundle.agent_mode.unwrap_or(AgentMode::Single),
    };

    let task_regime = match cli.task_type {
        Some(CliTaskType::Sequential) => TaskRegime::Sequential,
        Some(CliTaskType::Combined) => TaskRegime::Combined,
        Some(CliTaskType::Independent) => TaskRegime::Independent,
        None => TaskRegime::Sequential,
    };

    let scenario_selection = match &cli.scenarios {
        Some(spec) => ScenarioSelection::parse(spec)?,
        None => ScenarioSelection::All,
    };

    let categories = if cli.task_categories.is_empty() {
        None
    } else {
        Some(
            cli.task_categories
                .iter()
                .map(|c| TaskCategory::from(c.as_str()))
                .collect(),
        )
    };

    let required_agent_count = cli.agent_count_filter.map(|f| match f {
        CliAgentCountFilter::Single => AgentCountFilter::Single,
        CliAgentCountFilter::Multi => AgentCountFilter::Multi,
        CliAgentCountFilter::All => AgentCountFilter::All,
    });

    let dataset_root = cli
        .dataset
        .clone()
        .or(bundle.dataset_root.clone())
        .ok_or_else(|| EvalError::Configuration("no dataset root given (--dataset or --config)".to_string()))?;

    let output_root = cli
        .output
        .clone()
        .or(bundle.output_root.clone())
        .unwrap_or_else(|| PathBuf::from("./eval_output"));

    let spec = RunSpec {
        agent_mode,
        task_regime,
        scenario_selection,
        task_filter: TaskFilter {
            categories,
            required_agent_count,
        },
        parallelism: cli.parallel.unwrap_or(1),
        step_budget: cli.step_budget.unwrap_or(50),
        custom_suffix: cli.suffix.clone(),
    };
    spec.validate()?;

    let config = RunConfig {
        spec,
        dataset_root,
        output_root,
        llm_call_timeout_secs: bundle.llm_call_timeout_secs.unwrap_or(60),
        scenario_timeout_secs: bundle.scenario_timeout_secs,
        retry_policy: bundle.retry_policy.unwrap_or_default(),
        detail_level: bundle.detail_level.unwrap_or_else(|| "normal".to_string()),
        show_properties: bundle.show_properties.unwrap_or(false),
        only_discovered: bundle.only_discovered.unwrap_or(false),
        shutdown_grace_secs: bundle.shutdown_grace_secs.unwrap_or(30),
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dataset_root_is_a_configuration_error() {
        let cli = Cli::parse_from(["embodied-eval", "--scenarios", "all"]);
        assert!(build_run_config(&cli).is_err());
    }

    #[test]
    fn dataset_flag_and_defaults_produce_a_valid_config() {
        let cli = Cli::parse_from(["embodied-eval", "--dataset", "/tmp/dataset"]);
        let config = build_run_config(&cli).unwrap();
        assert_eq!(config.spec.agent_mode, AgentMode::Single);
        assert_eq!(config.spec.task_regime, TaskRegime::Sequential);
        assert_eq!(config.spec.parallelism, 1);
    }

    #[test]
    fn worker_invocation_is_detected() {
        let cli = Cli::parse_from([
            "embodied-eval",
            "--worker-job",
            "/tmp/job.json",
            "--worker-result",
            "/tmp/result.json",
        ]);
        assert!(cli.is_worker_invocation());
    }
}
