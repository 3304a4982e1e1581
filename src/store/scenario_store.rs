//! Per-scenario artifacts: trajectory file, execution log, LLM Q&A log
//! (§4.1). Every mutating method leaves the in-memory state identical to
//! what was just persisted, so there is never a window where the two
//! diverge (§4.1 "no in-memory buffering of unflushed data").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::atomic;
use super::ScenarioPaths;
use crate::error::EvalError;
use crate::models::{ActionRecord, CompletionAnalysis, FinalizeReason, TaskTrajectory};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TaskTrajectoryRecord {
    task_index: u32,
    #[serde(flatten)]
    trajectory: TaskTrajectory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaLogEntry {
    pub task_index: u32,
    pub action_index: u32,
    pub agent_id: String,
    pub raw_prompt: String,
    pub raw_response: String,
    pub extracted_command: String,
    pub timestamp: DateTime<Utc>,
}

/// One task's outcome, written to the execution log when the task stops
/// accepting new actions (§3 finalization invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFinalization {
    pub task_index: u32,
    pub reason: FinalizeReason,
    pub analysis: CompletionAnalysis,
    pub total_steps: u32,
    pub successful_steps: u32,
    pub failed_steps: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub scenario_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finalizations: Vec<TaskFinalization>,
    /// Verifier-oscillation notes and other non-fatal anomalies, surfaced
    /// into `run_summary.json` at coordinator time (§3).
    #[serde(default)]
    pub anomalies: Vec<String>,
}

/// Handle for one scenario's artifacts, held by the worker running it.
pub struct ScenarioHandle {
    scenario_id: String,
    paths: ScenarioPaths,
    trajectories: Vec<TaskTrajectoryRecord>,
    qa_log: Vec<QaLogEntry>,
    execution_log: ExecutionLog,
}

impl ScenarioHandle {
    /// Opens (or resumes) a scenario's artifacts. Existing files, if any,
    /// are loaded so a worker restarted after a crash continues from the
    /// last fully-persisted state rather than from scratch.
    pub async fn open(scenario_id: &str, paths: ScenarioPaths) -> Result<Self, EvalError> {
        let trajectories: Vec<TaskTrajectoryRecord> =
            atomic::load_json(&paths.trajectory).await?.unwrap_or_default();
        let qa_log: Vec<QaLogEntry> = atomic::load_json(&paths.llm_qa).await?.unwrap_or_default();
        let execution_log = atomic::load_json(&paths.execution_log)
            .await?
            .unwrap_or_else(|| ExecutionLog {
                scenario_id: scenario_id.to_string(),
                started_at: Utc::now(),
                finished_at: None,
                finalizations: Vec::new(),
                anomalies: Vec::new(),
            });

        Ok(Self {
            scenario_id: scenario_id.to_string(),
            paths,
            trajectories,
            qa_log,
            execution_log,
        })
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    /// Already-resumed steps for `task_index`, zero for a task never
    /// started. Callers use this to skip re-issuing completed actions after
    /// a resumed run.
    pub fn next_action_index(&self, task_index: u32) -> u32 {
        self.find(task_index)
            .map(|r| r.trajectory.next_action_index())
            .unwrap_or(0)
    }

    pub fn has_completed(&self, task_index: u32, subtask_index: u32) -> bool {
        self.find(task_index)
            .is_some_and(|r| r.trajectory.has_completed(subtask_index))
    }

    /// Every subtask completion persisted for `task_index` so far, in
    /// emission order. Used to derive `actual_completion_step` at
    /// finalization without re-deriving it from the tracker alone.
    pub fn trajectory_subtask_completions(
        &self,
        task_index: u32,
    ) -> Vec<crate::models::SubtaskCompletion> {
        self.find(task_index)
            .map(|r| r.trajectory.subtask_completions.clone())
            .unwrap_or_default()
    }

    pub fn is_finalized(&self, task_index: u32) -> bool {
        self.execution_log
            .finalizations
            .iter()
            .any(|f| f.task_index == task_index)
    }

    fn find(&self, task_index: u32) -> Option<&TaskTrajectoryRecord> {
        self.trajectories.iter().find(|r| r.task_index == task_index)
    }

    fn find_or_insert_mut(&mut self, task_index: u32) -> &mut TaskTrajectory {
        if let Some(pos) = self.trajectories.iter().position(|r| r.task_index == task_index) {
            return &mut self.trajectories[pos].trajectory;
        }
        self.trajectories.push(TaskTrajectoryRecord {
            task_index,
            trajectory: TaskTrajectory::default(),
        });
        &mut self.trajectories.last_mut().unwrap().trajectory
    }

    pub async fn append_action(
        &mut self,
        task_index: u32,
        record: ActionRecord,
    ) -> Result<(), EvalError> {
        self.find_or_insert_mut(task_index).push_action(record);
        self.flush_trajectories().await
    }

    /// Records a new subtask completion if `subtask_index` has not already
    /// been satisfied for this task; completion is monotonic (§4.2) so a
    /// repeat call is a silent no-op rather than an overwrite.
    pub async fn record_subtask_completion(
        &mut self,
        task_index: u32,
        subtask_index: u32,
        completed_at: u32,
    ) -> Result<bool, EvalError> {
        let trajectory = self.find_or_insert_mut(task_index);
        let is_new = !trajectory.has_completed(subtask_index);
        trajectory.record_completion(subtask_index, completed_at);
        if is_new {
            self.flush_trajectories().await?;
        }
        Ok(is_new)
    }

    /// Discards a partially-written, never-finalized task's trajectory.
    /// Agent conversational state cannot be serialized, so a resumed run
    /// cannot continue a task mid-flight; it restarts that task from
    /// scratch rather than appending on top of stale actions.
    pub async fn reset_task(&mut self, task_index: u32) -> Result<(), EvalError> {
        if self.is_finalized(task_index) {
            return Ok(());
        }
        self.trajectories.retain(|r| r.task_index != task_index);
        self.flush_trajectories().await
    }

    pub async fn record_anomaly(&mut self, message: String) -> Result<(), EvalError> {
        self.execution_log.anomalies.push(message);
        self.flush_execution_log().await
    }

    pub async fn append_qa(&mut self, qa: QaLogEntry) -> Result<(), EvalError> {
        self.qa_log.push(qa);
        atomic::atomic_write_json(&self.paths.llm_qa, &self.qa_log).await
    }

    pub async fn finalize_task(&mut self, finalization: TaskFinalization) -> Result<(), EvalError> {
        self.execution_log.finalizations.push(finalization);
        self.flush_execution_log().await
    }

    pub async fn close(mut self) -> Result<(), EvalError> {
        self.execution_log.finished_at = Some(Utc::now());
        self.flush_execution_log().await
    }

    async fn flush_trajectories(&self) -> Result<(), EvalError> {
        atomic::atomic_write_json(&self.paths.trajectory, &self.trajectories).await
    }

    async fn flush_execution_log(&self) -> Result<(), EvalError> {
        atomic::atomic_write_json(&self.paths.execution_log, &self.execution_log).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionStatus;

    fn paths(dir: &std::path::Path) -> ScenarioPaths {
        ScenarioPaths {
            trajectory: dir.join("trajectory.json"),
            execution_log: dir.join("execution.json"),
            llm_qa: dir.join("qa.json"),
        }
    }

    fn action(idx: u32) -> ActionRecord {
        ActionRecord {
            action_index: idx,
            agent_id: "agent-0".into(),
            command: "GOTO room_a".into(),
            status: ActionStatus::Success,
            result_message: "ok".into(),
            timestamp: Utc::now(),
            result: None,
        }
    }

    #[tokio::test]
    async fn append_action_persists_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = ScenarioHandle::open("00001", paths(dir.path())).await.unwrap();
        handle.append_action(1, action(0)).await.unwrap();
        handle.append_action(1, action(1)).await.unwrap();
        assert_eq!(handle.next_action_index(1), 2);

        let resumed = ScenarioHandle::open("00001", paths(dir.path())).await.unwrap();
        assert_eq!(resumed.next_action_index(1), 2);
    }

    #[tokio::test]
    async fn subtask_completion_is_monotonic_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = ScenarioHandle::open("00001", paths(dir.path())).await.unwrap();
        let first = handle.record_subtask_completion(1, 1, 2).await.unwrap();
        let second = handle.record_subtask_completion(1, 1, 9).await.unwrap();
        assert!(first);
        assert!(!second, "already-completed subtask must not re-trigger");
        assert!(handle.has_completed(1, 1));
    }

    #[tokio::test]
    async fn finalize_task_is_visible_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = ScenarioHandle::open("00001", paths(dir.path())).await.unwrap();
        handle
            .finalize_task(TaskFinalization {
                task_index: 1,
                reason: FinalizeReason::Terminator,
                analysis: CompletionAnalysis::new(true, true, 3, 3),
                total_steps: 4,
                successful_steps: 4,
                failed_steps: 0,
                started_at: Utc::now(),
                finished_at: Utc::now(),
            })
            .await
            .unwrap();

        let resumed = ScenarioHandle::open("00001", paths(dir.path())).await.unwrap();
        assert!(resumed.is_finalized(1));
    }
}
