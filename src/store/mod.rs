//! C1 Trajectory Store (§4.1): directory layout, atomic per-scenario
//! artifacts, the shared run-wide CSV, and `run_summary.json`.

pub mod atomic;
pub mod csv_writer;
pub mod scenario_store;
pub mod summary_writer;

pub use csv_writer::{append_csv_row, read_all_rows, CsvRow};
pub use scenario_store::{ExecutionLog, QaLogEntry, ScenarioHandle, TaskFinalization};
pub use summary_writer::{load_run_summary, write_run_summary};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::{AgentMode, TaskRegime};

/// `<timestamp>_<agent_mode>_<task_regime>_<suffix>` (§4.1). `suffix` falls
/// back to `"run"` when `custom_suffix` is empty so the directory name is
/// never left with a trailing underscore.
pub fn format_run_name(
    started_at: DateTime<Utc>,
    agent_mode: AgentMode,
    task_regime: TaskRegime,
    custom_suffix: &str,
) -> String {
    let suffix = if custom_suffix.trim().is_empty() {
        "run"
    } else {
        custom_suffix.trim()
    };
    format!(
        "{}_{}_{}_{}",
        started_at.format("%Y%m%dT%H%M%SZ"),
        agent_mode.as_str(),
        task_regime.as_str(),
        sanitize(suffix)
    )
}

/// Keeps run names filesystem-safe without pulling in a slug crate: anything
/// that isn't alphanumeric, `-`, or `_` becomes `-`.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// Top-level paths for one run's output directory (§4.1, §6).
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub run_dir: PathBuf,
}

impl RunPaths {
    pub fn new(output_root: &Path, run_name: &str) -> Self {
        Self {
            run_dir: output_root.join(run_name),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join("run_summary.json")
    }

    pub fn evaluation_log_path(&self) -> PathBuf {
        self.run_dir.join("evaluation_log.log")
    }

    pub fn csv_path(&self) -> PathBuf {
        self.run_dir.join("subtask_execution_log.csv")
    }

    pub fn trajectories_dir(&self) -> PathBuf {
        self.run_dir.join("trajectories")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.run_dir.join("logs")
    }

    pub fn llm_qa_dir(&self) -> PathBuf {
        self.run_dir.join("llm_qa")
    }

    pub fn scenario_paths(&self, scenario_id: &str) -> ScenarioPaths {
        ScenarioPaths {
            trajectory: self
                .trajectories_dir()
                .join(format!("{scenario_id}_trajectory.json")),
            execution_log: self.logs_dir().join(format!("{scenario_id}_execution.json")),
            llm_qa: self.llm_qa_dir().join(format!("{scenario_id}_llm_qa.json")),
        }
    }
}

/// Per-scenario artifact paths, each written independently under the atomic
/// write discipline (§4.1).
#[derive(Debug, Clone)]
pub struct ScenarioPaths {
    pub trajectory: PathBuf,
    pub execution_log: PathBuf,
    pub llm_qa: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_name_falls_back_to_run_when_suffix_empty() {
        let ts = DateTime::parse_from_rfc3339("2026-08-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let name = format_run_name(ts, AgentMode::Single, TaskRegime::Sequential, "");
        assert!(name.ends_with("_single_sequential_run"));
    }

    #[test]
    fn run_name_sanitizes_unsafe_suffix_characters() {
        let ts = DateTime::parse_from_rfc3339("2026-08-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let name = format_run_name(
            ts,
            AgentMode::CentralizedMulti,
            TaskRegime::Combined,
            "gpt-4o/trial 1",
        );
        assert!(name.ends_with("_centralized-multi_combined_gpt-4o-trial-1"));
    }
}
