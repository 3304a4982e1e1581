//! Regime-specific drivers (§4.4 Regime-specific behavior): what stays and
//! what resets between tasks. All three funnel into the same
//! [`super::control_loop::run_task`].

use crate::config::RunConfig;
use crate::error::EvalError;
use crate::models::scenario::Task;
use crate::simulator::Simulator;
use crate::store::ScenarioHandle;
use crate::tracker::CompletionTracker;

use super::control_loop::{run_task, Roster, TaskOutcome, TaskSpec};

/// One `TaskTrajectory` per task; simulator and roster state persist across
/// tasks (§3, §4.4 Sequential).
pub async fn sequential_regime(
    simulator: &mut dyn Simulator,
    roster: &mut Roster,
    tasks: &[Task],
    config: &RunConfig,
    store: &mut ScenarioHandle,
) -> Result<Vec<TaskOutcome>, EvalError> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        if store.is_finalized(task.task_index) {
            continue;
        }
        store.reset_task(task.task_index).await?;
        for (_, agent) in roster.iter_mut() {
            agent.set_task(&task.description).await?;
        }

        let spec = TaskSpec {
            task_index: task.task_index,
            description: task.description.clone(),
            constituents: vec![task],
            start_action_index: store.next_action_index(task.task_index),
            tracker: CompletionTracker::seeded(&store.trajectory_subtask_completions(task.task_index)),
        };
        outcomes.push(run_task(simulator, roster, spec, config, store).await?);
    }
    Ok(outcomes)
}

/// All tasks concatenated into one super-task description against one
/// continuous simulator + agent session; exactly one `TaskTrajectory` whose
/// subtask indices are the constituent tasks' positions (§3, §4.4 Combined).
///
/// The trajectory's `task_index` uses `0` as the sentinel for "the combined
/// super-task" since real task indices are 1-based (§3).
pub const COMBINED_TASK_INDEX: u32 = 0;

pub async fn combined_regime(
    simulator: &mut dyn Simulator,
    roster: &mut Roster,
    tasks: &[Task],
    config: &RunConfig,
    store: &mut ScenarioHandle,
) -> Result<Vec<TaskOutcome>, EvalError> {
    if store.is_finalized(COMBINED_TASK_INDEX) {
        return Ok(Vec::new());
    }
    let description = tasks
        .iter()
        .map(|t| t.description.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    for (_, agent) in roster.iter_mut() {
        agent.set_task(&description).await?;
    }

    let spec = TaskSpec {
        task_index: COMBINED_TASK_INDEX,
        description,
        constituents: tasks.iter().collect(),
        start_action_index: store.next_action_index(COMBINED_TASK_INDEX),
        tracker: CompletionTracker::seeded(&store.trajectory_subtask_completions(COMBINED_TASK_INDEX)),
    };
    Ok(vec![run_task(simulator, roster, spec, config, store).await?])
}

/// Each constituent task gets a fresh simulator seeding and fresh agent
/// conversational state via the `reset()` contract methods rather than
/// fresh instances; no state flows between tasks (§3, §4.4 Independent).
/// Outcomes stream to the store as each task finishes; nothing beyond the
/// small [`TaskOutcome`] summaries is held across iterations.
pub async fn independent_regime(
    simulator: &mut dyn Simulator,
    roster: &mut Roster,
    tasks: &[Task],
    config: &RunConfig,
    store: &mut ScenarioHandle,
) -> Result<Vec<TaskOutcome>, EvalError> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        if store.is_finalized(task.task_index) {
            continue;
        }
        simulator.reset().await?;
        for (_, agent) in roster.iter_mut() {
            agent.reset().await?;
        }
        store.reset_task(task.task_index).await?;
        for (_, agent) in roster.iter_mut() {
            agent.set_task(&task.description).await?;
        }

        let spec = TaskSpec {
            task_index: task.task_index,
            description: task.description.clone(),
            constituents: vec![task],
            start_action_index: 0,
            tracker: CompletionTracker::new(),
        };
        outcomes.push(run_task(simulator, roster, spec, config, store).await?);
    }
    Ok(outcomes)
}
