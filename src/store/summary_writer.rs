//! `run_summary.json` (§4.6): written once at the end of a run, and again
//! immediately if shutdown is requested mid-run so the partial summary is
//! never lost (§4.6 SIGINT handling).

use std::path::Path;

use crate::error::EvalError;
use crate::models::RunSummary;

use super::atomic;
use super::RunPaths;

pub async fn write_run_summary(paths: &RunPaths, summary: &RunSummary) -> Result<(), EvalError> {
    atomic::atomic_write_json(&paths.summary_path(), summary).await
}

pub async fn load_run_summary(path: &Path) -> Result<Option<RunSummary>, EvalError> {
    atomic::load_json(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryStatistics, RunInfo};
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn write_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), "run-1");
        let summary = RunSummary {
            run_info: RunInfo {
                run_name: "run-1".into(),
                started_at: Utc::now(),
                finished_at: None,
                agent_mode: "single".into(),
                task_regime: "sequential".into(),
                parallelism: 1,
                scenario_count: 1,
                selection_descriptor: "all".into(),
                interrupted: false,
            },
            task_category_statistics: BTreeMap::new(),
            overall_summary: CategoryStatistics::default(),
            failed_scenarios: Vec::new(),
            anomalies: Vec::new(),
        };

        write_run_summary(&paths, &summary).await.unwrap();
        let loaded = load_run_summary(&paths.summary_path()).await.unwrap().unwrap();
        assert_eq!(loaded.run_info.run_name, "run-1");
    }
}
