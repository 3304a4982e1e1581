//! C5 Scenario Runner (§4.5): one scenario end to end, from disk load
//! through a closed trajectory handle. Executable in an isolated worker
//! process; it shares no mutable state with the coordinator except through
//! files (§4.5 Isolation).

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::agent::{Agent, AgentFactory};
use crate::config::{RunConfig, TaskRegime};
use crate::dataset;
use crate::error::EvalError;
use crate::executor::{
    combined_regime, independent_regime, sequential_regime, Roster, TaskOutcome,
    COMBINED_TASK_INDEX,
};
use crate::models::scenario::Task;
use crate::models::{FinalizeReason, TaskCategory};
use crate::simulator::SimulatorFactory;
use crate::store::{append_csv_row, CsvRow, RunPaths, ScenarioHandle, TaskFinalization};

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_index: u32,
    pub category: TaskCategory,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub task_results: Vec<TaskResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One `(description, category)` lookup per trajectory `task_index`.
/// `combined` regime's sentinel index has no matching `Task`, so it gets a
/// synthetic description covering every constituent (§4.4 Combined).
fn task_meta(tasks: &[Task], task_index: u32) -> (String, TaskCategory) {
    if task_index == COMBINED_TASK_INDEX {
        let description = tasks
            .iter()
            .map(|t| t.description.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        return (description, TaskCategory::Other("combined".to_string()));
    }
    tasks
        .iter()
        .find(|t| t.task_index == task_index)
        .map(|t| (t.description.clone(), t.category.clone()))
        .unwrap_or_else(|| (String::new(), TaskCategory::Other("unknown".to_string())))
}

fn status_label(reason: FinalizeReason) -> &'static str {
    match reason {
        FinalizeReason::Terminator => "success",
        FinalizeReason::BudgetExhausted => "budget_exhausted",
        FinalizeReason::SimulatorError => "simulator_error",
        FinalizeReason::AgentError => "agent_error",
        FinalizeReason::ScenarioTimeout => "scenario_timeout",
    }
}

/// Runs one scenario's tasks according to `config.spec.task_regime`,
/// flushing every artifact through C1/C2 as it goes, and returns the
/// structured result C6 aggregates into the run summary (§4.5 step 7).
pub async fn run_scenario<SF, AF>(
    dataset_root: &Path,
    scenario_id: &str,
    config: &RunConfig,
    run_paths: &RunPaths,
    simulator_factory: &SF,
    agent_factory: &AF,
) -> Result<ScenarioResult, EvalError>
where
    SF: SimulatorFactory,
    AF: AgentFactory,
{
    let started_at = Utc::now();
    let scenario = dataset::load_scenario(dataset_root, scenario_id)?;

    let mut simulator = simulator_factory
        .initialize(&scenario.scene, &scenario.agent_configs)
        .await?;

    let mut roster: Roster = Vec::with_capacity(scenario.agent_configs.len());
    for agent_config in &scenario.agent_configs {
        let handle = agent_factory
            .spawn(&agent_config.agent_id, config.spec.agent_mode)
            .await?;
        roster.push((agent_config.agent_id.clone(), Box::new(handle) as Box<dyn Agent>));
    }

    let paths = run_paths.scenario_paths(scenario_id);
    let mut store = ScenarioHandle::open(scenario_id, paths).await?;

    let outcomes = match config.spec.task_regime {
        TaskRegime::Sequential => {
            sequential_regime(&mut simulator, &mut roster, &scenario.tasks, config, &mut store).await?
        }
        TaskRegime::Combined => {
            combined_regime(&mut simulator, &mut roster, &scenario.tasks, config, &mut store).await?
        }
        TaskRegime::Independent => {
            independent_regime(&mut simulator, &mut roster, &scenario.tasks, config, &mut store).await?
        }
    };

    let mut task_results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let (description, category) = task_meta(&scenario.tasks, outcome.task_index);
        let analysis = outcome.completion_analysis.clone();

        store
            .finalize_task(TaskFinalization {
                task_index: outcome.task_index,
                reason: outcome.finalize_reason,
                analysis: analysis.clone(),
                total_steps: outcome.total_steps,
                successful_steps: outcome.successful_steps,
                failed_steps: outcome.failed_steps,
                started_at: outcome.started_at,
                finished_at: outcome.finished_at,
            })
            .await?;

        let duration_seconds =
            (outcome.finished_at - outcome.started_at).num_milliseconds() as f64 / 1000.0;
        let command_success_rate = if outcome.total_steps == 0 {
            0.0
        } else {
            outcome.successful_steps as f64 / outcome.total_steps as f64
        };

        append_csv_row(
            &run_paths.csv_path(),
            CsvRow {
                timestamp: Utc::now().to_rfc3339(),
                scenario_id: scenario_id.to_string(),
                task_index: outcome.task_index,
                task_description: description.clone(),
                task_category: category.to_string(),
                agent_type: config.spec.agent_mode.as_str().to_string(),
                status: status_label(outcome.finalize_reason).to_string(),
                task_executed: true,
                subtask_completed: analysis.actually_completed,
                model_claimed_done: analysis.model_claimed_completion,
                actual_completion_step: analysis.actual_completion_step,
                done_command_step: analysis.done_step,
                total_steps: outcome.total_steps,
                successful_steps: outcome.successful_steps,
                failed_steps: outcome.failed_steps,
                command_success_rate,
                start_time: outcome.started_at.to_rfc3339(),
                end_time: outcome.finished_at.to_rfc3339(),
                duration_seconds,
                llm_interactions: outcome.total_steps,
            },
        )
        .await?;

        task_results.push(TaskResult {
            task_index: outcome.task_index,
            category,
            outcome,
        });
    }

    store.close().await?;
    let finished_at = Utc::now();
    info!(scenario_id, tasks = task_results.len(), "scenario finished");

    Ok(ScenarioResult {
        scenario_id: scenario_id.to_string(),
        task_results,
        started_at,
        finished_at,
    })
}
