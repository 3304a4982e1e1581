//! Per-task execution artifacts (§3: `ActionRecord`, `SubtaskCompletion`,
//! `TaskTrajectory`, `CompletionAnalysis`) and their invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one applied (or rejected) action (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Success,
    Failure,
    Invalid,
}

/// One entry in a task's action sequence (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_index: u32,
    pub agent_id: String,
    pub command: String,
    pub status: ActionStatus,
    pub result_message: String,
    pub timestamp: DateTime<Utc>,
    /// Raw simulator payload, when present (e.g. object state deltas).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// One objective-completion event (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubtaskCompletion {
    pub subtask_index: u32,
    pub completed_at: u32,
}

/// Why a [`TaskTrajectory`] stopped accepting new actions (§3 finalization
/// invariant; kept out of the trajectory body, it lives in the execution
/// log instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    /// The agent issued a DONE-family terminator.
    Terminator,
    /// `step_budget` was reached without a terminator.
    BudgetExhausted,
    /// The simulator raised while applying an action.
    SimulatorError,
    /// The agent/LLM retry policy was exhausted.
    AgentError,
    /// A per-scenario wall-clock timeout fired.
    ScenarioTimeout,
}

/// One element per task; exactly one per scenario under the `combined`
/// regime (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskTrajectory {
    pub action_sequence: Vec<ActionRecord>,
    pub subtask_completions: Vec<SubtaskCompletion>,
}

impl TaskTrajectory {
    pub fn next_action_index(&self) -> u32 {
        self.action_sequence.len() as u32
    }

    pub fn push_action(&mut self, record: ActionRecord) {
        debug_assert_eq!(
            record.action_index,
            self.next_action_index(),
            "action_index must increase by 1 with no gaps"
        );
        self.action_sequence.push(record);
    }

    /// True once a given subtask index has already been recorded complete;
    /// completion is monotonic within a task (§4.2).
    pub fn has_completed(&self, subtask_index: u32) -> bool {
        self.subtask_completions
            .iter()
            .any(|c| c.subtask_index == subtask_index)
    }

    pub fn record_completion(&mut self, subtask_index: u32, completed_at: u32) {
        if !self.has_completed(subtask_index) {
            self.subtask_completions.push(SubtaskCompletion {
                subtask_index,
                completed_at,
            });
        }
    }
}

/// Four-way agreement classification between model claim and verifier truth
/// (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionAccuracy {
    Correct,
    Premature,
    Missed,
    Neither,
}

/// Derived per-task record produced at finalization (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionAnalysis {
    pub model_claimed_completion: bool,
    pub actually_completed: bool,
    pub accuracy: CompletionAccuracy,
    pub done_step: i64,
    pub actual_completion_step: i64,
}

impl CompletionAnalysis {
    pub fn new(
        model_claimed_completion: bool,
        actually_completed: bool,
        done_step: i64,
        actual_completion_step: i64,
    ) -> Self {
        let accuracy = match (model_claimed_completion, actually_completed) {
            (true, true) => CompletionAccuracy::Correct,
            (true, false) => CompletionAccuracy::Premature,
            (false, true) => CompletionAccuracy::Missed,
            (false, false) => CompletionAccuracy::Neither,
        };
        Self {
            model_claimed_completion,
            actually_completed,
            accuracy,
            done_step,
            actual_completion_step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(idx: u32, status: ActionStatus) -> ActionRecord {
        ActionRecord {
            action_index: idx,
            agent_id: "agent-0".into(),
            command: "GOTO room_a".into(),
            status,
            result_message: "ok".into(),
            timestamp: Utc::now(),
            result: None,
        }
    }

    #[test]
    fn action_index_must_form_a_contiguous_run() {
        let mut traj = TaskTrajectory::default();
        traj.push_action(record(0, ActionStatus::Success));
        assert_eq!(traj.next_action_index(), 1);
        traj.push_action(record(1, ActionStatus::Failure));
        assert_eq!(traj.next_action_index(), 2);
    }

    #[test]
    fn completion_is_recorded_once_per_subtask() {
        let mut traj = TaskTrajectory::default();
        traj.record_completion(1, 4);
        traj.record_completion(1, 9); // later oscillation must not overwrite
        assert_eq!(traj.subtask_completions.len(), 1);
        assert_eq!(traj.subtask_completions[0].completed_at, 4);
    }

    #[test]
    fn accuracy_classification_matches_the_four_quadrants() {
        assert_eq!(
            CompletionAnalysis::new(true, true, 3, 3).accuracy,
            CompletionAccuracy::Correct
        );
        assert_eq!(
            CompletionAnalysis::new(true, false, 3, -1).accuracy,
            CompletionAccuracy::Premature
        );
        assert_eq!(
            CompletionAnalysis::new(false, true, -1, 3).accuracy,
            CompletionAccuracy::Missed
        );
        assert_eq!(
            CompletionAnalysis::new(false, false, -1, -1).accuracy,
            CompletionAccuracy::Neither
        );
    }
}
