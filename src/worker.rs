//! Worker-process side of the self-reexec pool: process-level parallelism
//! without a second binary. The coordinator re-invokes the same executable
//! with `--worker-job`/`--worker-result`; this module is what that
//! invocation runs instead of the normal CLI path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::AgentFactory;
use crate::config::RunConfig;
use crate::error::EvalError;
use crate::runner::run_scenario;
use crate::simulator::SimulatorFactory;
use crate::store::{atomic, RunPaths};

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerJob {
    pub scenario_id: String,
    pub dataset_root: PathBuf,
    pub output_root: PathBuf,
    pub run_name: String,
    pub config: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerOutcome {
    Completed { task_count: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub scenario_id: String,
    pub outcome: WorkerOutcome,
}

/// Runs one scenario out-of-process and writes its outcome to `result_path`
/// rather than stdout, so it never interleaves with the child's own tracing
/// output (which the coordinator does not capture).
pub async fn run_worker_job<SF, AF>(
    job_path: &Path,
    result_path: &Path,
    simulator_factory: &SF,
    agent_factory: &AF,
) -> Result<(), EvalError>
where
    SF: SimulatorFactory,
    AF: AgentFactory,
{
    let job: WorkerJob = atomic::load_json(job_path).await?.ok_or_else(|| EvalError::Configuration(
        format!("worker job file missing: {job_path:?}"),
    ))?;

    let run_paths = RunPaths::new(&job.output_root, &job.run_name);
    let result = match run_scenario(
        &job.dataset_root,
        &job.scenario_id,
        &job.config,
        &run_paths,
        simulator_factory,
        agent_factory,
    )
    .await
    {
        Ok(scenario_result) => WorkerResult {
            scenario_id: job.scenario_id.clone(),
            outcome: WorkerOutcome::Completed {
                task_count: scenario_result.task_results.len(),
            },
        },
        Err(e) => WorkerResult {
            scenario_id: job.scenario_id.clone(),
            outcome: WorkerOutcome::Failed { reason: e.to_string() },
        },
    };

    atomic::atomic_write_json(result_path, &result).await
}
