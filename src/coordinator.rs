//! C6 Run Coordinator (§4.6): bounded worker-process pool, interrupt-safe
//! aggregation, run-summary emission.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::EvalError;
use crate::models::{CategoryStatistics, RunInfo, RunSummary};
use crate::store::{self, atomic as store_atomic, RunPaths};
use crate::worker::{WorkerJob, WorkerOutcome, WorkerResult};

/// Installs the SIGINT/SIGTERM cooperative-shutdown flag (§4.6). Returns a
/// handle the scheduling loop polls; it never panics on platforms without a
/// SIGTERM concept because the unix listener is only spawned under
/// `cfg(unix)`.
fn install_shutdown_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));

    let ctrl_c_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_flag.store(true, Ordering::SeqCst);
        }
    });

    #[cfg(unix)]
    {
        let term_flag = flag.clone();
        tokio::spawn(async move {
            if let Ok(mut term) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                term.recv().await;
                term_flag.store(true, Ordering::SeqCst);
            }
        });
    }

    flag
}

async fn wait_for_flag(flag: Arc<AtomicBool>) {
    loop {
        if flag.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Spawns the child worker process for one scenario and waits for it,
/// honoring the shutdown grace period before force-terminating, and the
/// per-scenario wall-clock timeout from `config.scenario_timeout()` if one
/// is configured (§5). Cleans up the job/result files once the outcome is
/// read so the run directory never accumulates scratch files (§4.1).
async fn spawn_and_wait(
    exe: &std::path::Path,
    job_path: PathBuf,
    result_path: PathBuf,
    shutdown: Arc<AtomicBool>,
    grace: Duration,
    scenario_timeout: Option<Duration>,
) -> (String, WorkerOutcome) {
    let job: Option<WorkerJob> = store_atomic::load_json(&job_path).await.ok().flatten();
    let scenario_id = job
        .map(|j| j.scenario_id)
        .unwrap_or_else(|| job_path.display().to_string());

    let mut command = tokio::process::Command::new(exe);
    command
        .arg("--worker-job")
        .arg(&job_path)
        .arg("--worker-result")
        .arg(&result_path);

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            let _ = tokio::fs::remove_file(&job_path).await;
            let _ = tokio::fs::remove_file(&result_path).await;
            return (
                scenario_id,
                WorkerOutcome::Failed {
                    reason: format!("failed to spawn worker process: {e}"),
                },
            );
        }
    };

    let outcome = tokio::select! {
        biased;
        status = child.wait() => status.err().map(|e| format!("worker process error: {e}")),
        _ = wait_for_flag(shutdown) => {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status.err().map(|e| format!("worker process error: {e}")),
                Err(_) => {
                    warn!(scenario_id, "worker did not exit within grace period, killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    Some("worker killed: did not exit within shutdown grace period".to_string())
                }
            }
        }
        _ = wait_for_timeout(scenario_timeout) => {
            warn!(scenario_id, "scenario exceeded its wall-clock timeout, killing worker");
            let _ = child.start_kill();
            let _ = child.wait().await;
            Some("scenario_timeout".to_string())
        }
    };

    let result = match outcome {
        Some(reason) => {
            let _ = tokio::fs::remove_file(&job_path).await;
            let _ = tokio::fs::remove_file(&result_path).await;
            (scenario_id, WorkerOutcome::Failed { reason })
        }
        None => {
            let loaded = store_atomic::load_json::<WorkerResult>(&result_path).await;
            let _ = tokio::fs::remove_file(&job_path).await;
            let _ = tokio::fs::remove_file(&result_path).await;
            match loaded {
                Ok(Some(result)) => (result.scenario_id, result.outcome),
                _ => (
                    scenario_id,
                    WorkerOutcome::Failed {
                        reason: "worker produced no result (crashed, killed, or interrupted)".to_string(),
                    },
                ),
            }
        }
    };

    result
}

/// Never resolves when `timeout` is `None`, so the `select!` arm is simply
/// never taken; resolves once `timeout` elapses otherwise.
async fn wait_for_timeout(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Drives a full run: schedules `scenario_ids` across a bounded process
/// pool, aggregates persisted artifacts, and writes `run_summary.json`.
///
/// `run_name`/`run_paths`/`started_at` are computed by the caller (rather
/// than here) so the CLI entry point can stand up the `evaluation_log.log`
/// file sink against the same run directory before any work starts.
pub async fn run_coordinator(
    dataset_root: &std::path::Path,
    config: RunConfig,
    scenario_ids: Vec<String>,
    selection_descriptor: String,
    run_name: String,
    run_paths: RunPaths,
    started_at: chrono::DateTime<Utc>,
) -> Result<RunSummary, EvalError> {
    let shutdown = install_shutdown_flag();
    let grace = Duration::from_secs(config.shutdown_grace_secs);
    let scenario_timeout = config.scenario_timeout();
    let exe = std::env::current_exe()
        .map_err(|e| EvalError::Configuration(format!("cannot resolve current executable: {e}")))?;

    let parallelism = config.spec.parallelism.min(scenario_ids.len().max(1)).max(1);
    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut join_set = tokio::task::JoinSet::new();
    let scenario_count = scenario_ids.len();

    for scenario_id in scenario_ids {
        if shutdown.load(Ordering::SeqCst) {
            info!("shutdown requested, no longer accepting new scenarios");
            break;
        }

        let job = WorkerJob {
            scenario_id: scenario_id.clone(),
            dataset_root: dataset_root.to_path_buf(),
            output_root: config.output_root.clone(),
            run_name: run_name.clone(),
            config: config.clone(),
        };
        let job_path = run_paths.run_dir.join(format!(".job_{scenario_id}.json"));
        let result_path = run_paths.run_dir.join(format!(".result_{scenario_id}.json"));
        store_atomic::atomic_write_json(&job_path, &job).await?;

        let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
            EvalError::Configuration(format!("scheduling semaphore closed unexpectedly: {e}"))
        })?;
        let exe = exe.clone();
        let shutdown = shutdown.clone();

        join_set.spawn(async move {
            let _permit = permit;
            spawn_and_wait(&exe, job_path, result_path, shutdown, grace, scenario_timeout).await
        });
    }

    let mut outcomes: Vec<(String, WorkerOutcome)> = Vec::with_capacity(scenario_count);
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!(error = %e, "worker task panicked"),
        }
    }

    let interrupted = shutdown.load(Ordering::SeqCst);
    let summary = build_run_summary(
        &run_paths,
        &run_name,
        started_at,
        &config,
        selection_descriptor,
        outcomes,
        interrupted,
    )
    .await?;

    store::write_run_summary(&run_paths, &summary).await?;
    Ok(summary)
}

async fn build_run_summary(
    run_paths: &RunPaths,
    run_name: &str,
    started_at: chrono::DateTime<Utc>,
    config: &RunConfig,
    selection_descriptor: String,
    outcomes: Vec<(String, WorkerOutcome)>,
    interrupted: bool,
) -> Result<RunSummary, EvalError> {
    let mut failed_scenarios = Vec::new();
    let mut anomalies = Vec::new();

    for (scenario_id, outcome) in &outcomes {
        match outcome {
            WorkerOutcome::Completed { .. } => {
                let execution_log_path = run_paths.logs_dir().join(format!("{scenario_id}_execution.json"));
                if let Some(log) = store_atomic::load_json::<crate::store::ExecutionLog>(&execution_log_path).await? {
                    anomalies.extend(log.anomalies);
                }
            }
            WorkerOutcome::Failed { reason } => {
                failed_scenarios.push(scenario_id.clone());
                anomalies.push(format!("scenario {scenario_id} failed: {reason}"));
            }
        }
    }

    let rows = store::read_all_rows(&run_paths.csv_path())?;
    let mut task_category_statistics: BTreeMap<String, CategoryStatistics> = BTreeMap::new();
    let mut overall_summary = CategoryStatistics::default();
    for row in &rows {
        let entry = task_category_statistics.entry(row.task_category.clone()).or_default();
        entry.total += 1;
        if row.subtask_completed {
            entry.completed += 1;
        }
        if row.model_claimed_done {
            entry.model_claimed += 1;
        }
        overall_summary.total += 1;
        if row.subtask_completed {
            overall_summary.completed += 1;
        }
        if row.model_claimed_done {
            overall_summary.model_claimed += 1;
        }
    }
    for entry in task_category_statistics.values_mut() {
        entry.recompute_accuracy();
    }
    overall_summary.recompute_accuracy();

    Ok(RunSummary {
        run_info: RunInfo {
            run_name: run_name.to_string(),
            started_at,
            finished_at: Some(Utc::now()),
            agent_mode: config.spec.agent_mode.as_str().to_string(),
            task_regime: config.spec.task_regime.as_str().to_string(),
            parallelism: config.spec.parallelism,
            scenario_count: outcomes.len(),
            selection_descriptor,
            interrupted,
        },
        task_category_statistics,
        overall_summary,
        failed_scenarios,
        anomalies,
    })
}
