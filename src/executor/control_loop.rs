//! C4 Task Executor (§4.4): the per-step control loop shared by all three
//! task-execution regimes. Regime differences (state carry-over, how many
//! constituent tasks feed one trajectory) live in [`super::regimes`]; this
//! module only knows about one task's roster, one simulator, and the
//! sequence of rounds it takes to finish.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::agent::{is_terminator, Agent, QaRecord};
use crate::config::settings::RetryPolicy;
use crate::config::RunConfig;
use crate::error::EvalError;
use crate::models::scenario::Task;
use crate::models::{ActionRecord, ActionStatus, CompletionAnalysis, FinalizeReason};
use crate::simulator::{ApplyStatus, Simulator};
use crate::store::{QaLogEntry, ScenarioHandle};
use crate::tracker::{oscillation_anomaly, CompletionTracker};

/// One task's worth of work for the control loop: a description, the
/// constituent tasks whose verifiers define its subtasks, and the
/// trajectory-level `task_index` it writes under.
///
/// Outside the `combined` regime `constituents` has exactly one element and
/// `required_subtasks` is `{1}`. Under `combined`, constituent position
/// (1-based) *is* the subtask index (§4.4 Combined).
pub struct TaskSpec<'a> {
    pub task_index: u32,
    pub description: String,
    pub constituents: Vec<&'a Task>,
    pub start_action_index: u32,
    pub tracker: CompletionTracker,
}

impl<'a> TaskSpec<'a> {
    pub fn required_subtasks(&self) -> BTreeSet<u32> {
        (1..=self.constituents.len() as u32).collect()
    }
}

/// One roster entry: an agent's id and its live instance. Single-agent
/// scenarios have one entry; multi-agent scenarios have one per
/// `agent_configs` record, however C5 chose to wire `agent_mode` (§9: the
/// executor is agnostic to centralized vs. decentralized beyond how many
/// instances it drives).
pub type Roster = Vec<(String, Box<dyn Agent>)>;

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_index: u32,
    pub finalize_reason: FinalizeReason,
    pub completion_analysis: CompletionAnalysis,
    pub total_steps: u32,
    pub successful_steps: u32,
    pub failed_steps: u32,
    pub started_at: chrono::DateTime<Utc>,
    pub finished_at: chrono::DateTime<Utc>,
}

/// Drives one [`TaskSpec`] to completion (§4.4 steps 1-10). The terminator
/// family ends a roster member's turn-taking rather than the whole loop, so
/// that a single-agent roster (the common case) degenerates exactly to "DONE
/// ends the loop" while a multi-agent roster waits for every member to
/// terminate (or the shared step budget) before finalizing.
pub async fn run_task(
    simulator: &mut dyn Simulator,
    roster: &mut Roster,
    spec: TaskSpec<'_>,
    config: &RunConfig,
    store: &mut ScenarioHandle,
) -> Result<TaskOutcome, EvalError> {
    let started_at = Utc::now();
    let task_index = spec.task_index;
    let required_subtasks = spec.required_subtasks();
    let mut tracker = spec.tracker;

    let mut active: Vec<bool> = vec![true; roster.len()];
    let mut action_index = spec.start_action_index;
    let mut successful_steps = 0u32;
    let mut failed_steps = 0u32;
    let mut done_step: Option<u32> = None;
    let mut finalize_reason = FinalizeReason::BudgetExhausted;
    let mut fatal: Option<EvalError> = None;

    'rounds: loop {
        if active.iter().all(|a| !a) {
            finalize_reason = FinalizeReason::Terminator;
            break;
        }
        if action_index >= config.spec.step_budget {
            finalize_reason = FinalizeReason::BudgetExhausted;
            break;
        }

        for member in 0..roster.len() {
            if !active[member] {
                continue;
            }
            if action_index >= config.spec.step_budget {
                finalize_reason = FinalizeReason::BudgetExhausted;
                break 'rounds;
            }

            let (agent_id, agent) = &mut roster[member];
            let agent_id = agent_id.clone();

            let env_description = simulator
                .describe_environment(
                    Some(&agent_id),
                    &config.detail_level,
                    config.show_properties,
                    config.only_discovered,
                )
                .await?;

            let decision = match decide_with_retry(
                agent.as_mut(),
                &env_description,
                &config.retry_policy,
                config.llm_call_timeout(),
            )
            .await
            {
                Ok(d) => d,
                Err(e) => {
                    warn!(task_index, %agent_id, error = %e, "agent exhausted retries");
                    finalize_reason = FinalizeReason::AgentError;
                    fatal = Some(e);
                    break 'rounds;
                }
            };

            let qa = QaRecord {
                agent_id: agent_id.clone(),
                task_index,
                action_index,
                raw_prompt: env_description.clone(),
                raw_response: decision.raw_response.clone(),
                extracted_command: decision.extracted_command.clone(),
            };
            store
                .append_qa(QaLogEntry {
                    task_index,
                    action_index,
                    agent_id: agent_id.clone(),
                    raw_prompt: qa.raw_prompt.clone(),
                    raw_response: qa.raw_response.clone(),
                    extracted_command: qa.extracted_command.clone(),
                    timestamp: Utc::now(),
                })
                .await?;
            agent.record_qa(&qa).await?;

            let command = decision.extracted_command.trim().to_string();

            if is_terminator(&command) {
                store
                    .append_action(
                        task_index,
                        ActionRecord {
                            action_index,
                            agent_id: agent_id.clone(),
                            command: command.clone(),
                            status: ActionStatus::Success,
                            result_message: "terminator issued".to_string(),
                            timestamp: Utc::now(),
                            result: None,
                        },
                    )
                    .await?;
                successful_steps += 1;
                action_index += 1;
                done_step.get_or_insert(action_index);
                active[member] = false;
                info!(task_index, %agent_id, step = action_index, "terminator issued");
                continue;
            }

            if command.is_empty() {
                store
                    .append_action(
                        task_index,
                        ActionRecord {
                            action_index,
                            agent_id: agent_id.clone(),
                            command,
                            status: ActionStatus::Invalid,
                            result_message: "empty command".to_string(),
                            timestamp: Utc::now(),
                            result: None,
                        },
                    )
                    .await?;
                failed_steps += 1;
                action_index += 1;
                continue;
            }

            match simulator.apply(&agent_id, &command).await {
                Ok(outcome) => {
                    let status = match outcome.status {
                        ApplyStatus::Success => ActionStatus::Success,
                        ApplyStatus::Failure => ActionStatus::Failure,
                        ApplyStatus::Invalid => ActionStatus::Invalid,
                    };
                    if status == ActionStatus::Success {
                        successful_steps += 1;
                    } else {
                        failed_steps += 1;
                    }
                    store
                        .append_action(
                            task_index,
                            ActionRecord {
                                action_index,
                                agent_id: agent_id.clone(),
                                command,
                                status,
                                result_message: outcome.message,
                                timestamp: Utc::now(),
                                result: outcome.result,
                            },
                        )
                        .await?;
                    action_index += 1;

                    let mut currently_satisfied = BTreeSet::new();
                    for (position, constituent) in spec.constituents.iter().enumerate() {
                        let subtask_index = position as u32 + 1;
                        let satisfied = simulator.verify_subtasks(constituent).await?;
                        if !satisfied.is_empty() {
                            currently_satisfied.insert(subtask_index);
                        }
                    }

                    let observation = tracker.observe(&currently_satisfied, action_index);
                    for completion in observation.newly_completed {
                        store
                            .record_subtask_completion(
                                task_index,
                                completion.subtask_index,
                                completion.completed_at,
                            )
                            .await?;
                    }
                    for subtask_index in observation.oscillated {
                        store
                            .record_anomaly(oscillation_anomaly(
                                store.scenario_id(),
                                task_index,
                                subtask_index,
                                action_index,
                            ))
                            .await?;
                    }
                }
                Err(e) => {
                    store
                        .append_action(
                            task_index,
                            ActionRecord {
                                action_index,
                                agent_id: agent_id.clone(),
                                command,
                                status: ActionStatus::Failure,
                                result_message: format!("simulator fault: {e}"),
                                timestamp: Utc::now(),
                                result: None,
                            },
                        )
                        .await?;
                    failed_steps += 1;
                    action_index += 1;
                    finalize_reason = FinalizeReason::SimulatorError;
                    fatal = Some(e);
                    break 'rounds;
                }
            }
        }
    }

    if let Some(e) = fatal {
        // Surfaced through the task outcome's finalize_reason; the error
        // itself is only logged, matching the propagation policy that a
        // task-ending failure never unwinds past the scenario (§7).
        warn!(task_index, error = %e, reason = ?finalize_reason, "task ended on error");
    }

    let history = store.trajectory_subtask_completions(task_index);
    let completion_analysis = tracker.analyze(&required_subtasks, &history, done_step.is_some(), done_step);

    Ok(TaskOutcome {
        task_index,
        finalize_reason,
        completion_analysis,
        total_steps: action_index,
        successful_steps,
        failed_steps,
        started_at,
        finished_at: Utc::now(),
    })
}

async fn decide_with_retry(
    agent: &mut dyn Agent,
    env_description: &str,
    retry: &RetryPolicy,
    timeout: Duration,
) -> Result<crate::agent::Decision, EvalError> {
    let mut attempt = 0;
    loop {
        let call = agent.decide(env_description);
        let result = tokio::time::timeout(timeout, call).await;
        match result {
            Ok(Ok(decision)) => return Ok(decision),
            Ok(Err(_)) if attempt < retry.max_retries => {
                tokio::time::sleep(retry.backoff_for_attempt(attempt)).await;
                attempt += 1;
            }
            Ok(Err(e)) => return Err(e),
            Err(_) if attempt < retry.max_retries => {
                tokio::time::sleep(retry.backoff_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(_) => return Err(EvalError::Timeout("agent decide() timed out".to_string())),
        }
    }
}
