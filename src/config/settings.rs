//! Run configuration (§3 `RunSpec`, §6 CLI surface).
//!
//! `RunSpec` models exactly the immutable fields §3 names. `RunConfig` wraps
//! it with the ambient knobs (dataset/output roots, retry policy, timeouts)
//! that a complete CLI needs but that §3 leaves to the surrounding system.
//! Per §6, the evaluation core itself reads no environment variables: only
//! the agent subsystem's LLM-provider credentials do, and that is out of
//! scope here. Layering stops at "config file, then CLI flags".

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::models::scenario::AgentCountFilter;
use crate::models::TaskCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentMode {
    Single,
    CentralizedMulti,
    DecentralizedMulti,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Single => "single",
            AgentMode::CentralizedMulti => "centralized-multi",
            AgentMode::DecentralizedMulti => "decentralized-multi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskRegime {
    Sequential,
    Combined,
    Independent,
}

impl TaskRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskRegime::Sequential => "sequential",
            TaskRegime::Combined => "combined",
            TaskRegime::Independent => "independent",
        }
    }
}

/// `--scenarios all | <start>-<end> | <id>[,<id>...]` (§6, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScenarioSelection {
    All,
    Range { start: String, end: String },
    List { ids: Vec<String> },
}

impl ScenarioSelection {
    /// Parse the `--scenarios` CLI flag's value.
    pub fn parse(spec: &str) -> Result<Self, EvalError> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("all") {
            return Ok(ScenarioSelection::All);
        }
        if let Some((start, end)) = spec.split_once('-') {
            if !start.is_empty() && !end.is_empty() && !spec.contains(',') {
                return Ok(ScenarioSelection::Range {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        let ids: Vec<String> = spec
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(EvalError::Configuration(format!(
                "could not parse --scenarios value: {spec:?}"
            )));
        }
        Ok(ScenarioSelection::List { ids })
    }

    pub fn descriptor(&self) -> String {
        match self {
            ScenarioSelection::All => "all".to_string(),
            ScenarioSelection::Range { start, end } => format!("{start}-{end}"),
            ScenarioSelection::List { ids } => ids.join(","),
        }
    }
}

/// Post-selection filter (§4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<HashSet<TaskCategory>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_agent_count: Option<AgentCountFilter>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.categories.is_none() && self.required_agent_count.is_none()
    }
}

/// Immutable inputs for one run (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub agent_mode: AgentMode,
    pub task_regime: TaskRegime,
    pub scenario_selection: ScenarioSelection,
    #[serde(default)]
    pub task_filter: TaskFilter,
    pub parallelism: usize,
    pub step_budget: u32,
    #[serde(default)]
    pub custom_suffix: String,
}

impl RunSpec {
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.parallelism == 0 {
            return Err(EvalError::Configuration(
                "parallelism must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounded exponential backoff for agent/LLM retries (§4.4, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    250
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let ms = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(ms.round() as u64)
    }
}

/// Full run configuration: `RunSpec` plus the ambient knobs a CLI needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub spec: RunSpec,
    pub dataset_root: PathBuf,
    pub output_root: PathBuf,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_call_timeout_secs: u64,
    #[serde(default)]
    pub scenario_timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Detail level passed to `Simulator::describe_environment` (§6).
    #[serde(default = "default_detail_level")]
    pub detail_level: String,
    #[serde(default)]
    pub show_properties: bool,
    #[serde(default)]
    pub only_discovered: bool,
    /// Grace period given to in-flight workers after SIGINT/SIGTERM (§4.6).
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_detail_level() -> String {
    "normal".to_string()
}
fn default_shutdown_grace_secs() -> u64 {
    30
}

impl RunConfig {
    /// Load a YAML config bundle (`--config <name>`), if any, falling back
    /// to defaults for every field the file omits.
    pub fn load_bundle(path: Option<&PathBuf>) -> Result<ConfigBundle, EvalError> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    EvalError::Configuration(format!("failed to read config {p:?}: {e}"))
                })?;
                serde_yaml::from_str(&content).map_err(|e| {
                    EvalError::Configuration(format!("failed to parse config {p:?}: {e}"))
                })
            }
            None => Ok(ConfigBundle::default()),
        }
    }

    pub fn scenario_timeout(&self) -> Option<Duration> {
        self.scenario_timeout_secs.map(Duration::from_secs)
    }

    pub fn llm_call_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_call_timeout_secs)
    }
}

/// The subset of ambient fields a `--config <name>` YAML bundle may set;
/// CLI flags always take precedence when merging via [`crate::cli::build_run_config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigBundle {
    #[serde(default)]
    pub agent_mode: Option<AgentMode>,
    #[serde(default)]
    pub dataset_root: Option<PathBuf>,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
    #[serde(default)]
    pub llm_call_timeout_secs: Option<u64>,
    #[serde(default)]
    pub scenario_timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub detail_level: Option<String>,
    #[serde(default)]
    pub show_properties: Option<bool>,
    #[serde(default)]
    pub only_discovered: Option<bool>,
    #[serde(default)]
    pub shutdown_grace_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all() {
        assert!(matches!(
            ScenarioSelection::parse("all").unwrap(),
            ScenarioSelection::All
        ));
    }

    #[test]
    fn parses_range() {
        match ScenarioSelection::parse("00001-00010").unwrap() {
            ScenarioSelection::Range { start, end } => {
                assert_eq!(start, "00001");
                assert_eq!(end, "00010");
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn parses_list() {
        match ScenarioSelection::parse("00001,00002,00003").unwrap() {
            ScenarioSelection::List { ids } => assert_eq!(ids.len(), 3),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_spec() {
        assert!(ScenarioSelection::parse("").is_err());
    }

    #[test]
    fn zero_parallelism_is_a_configuration_error() {
        let spec = RunSpec {
            agent_mode: AgentMode::Single,
            task_regime: TaskRegime::Sequential,
            scenario_selection: ScenarioSelection::All,
            task_filter: TaskFilter::default(),
            parallelism: 0,
            step_budget: 10,
            custom_suffix: String::new(),
        };
        assert!(spec.validate().is_err());
    }
}
