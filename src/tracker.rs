//! C2 Completion Tracker (§4.2): turns a simulator's per-step verifier
//! output into the monotonic completion record a [`TaskTrajectory`] stores,
//! and classifies the model's DONE claim against it at finalization.

use std::collections::BTreeSet;

use crate::models::{CompletionAccuracy, CompletionAnalysis, SubtaskCompletion};

/// Result of diffing one step's verifier output against everything already
/// recorded complete for a task.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Subtasks satisfied for the first time this step; callers persist
    /// these via [`crate::store::ScenarioHandle::record_subtask_completion`].
    pub newly_completed: Vec<SubtaskCompletion>,
    /// Subtasks the verifier previously reported satisfied but now omits.
    /// Completion stays recorded (§4.2 monotonicity); callers surface these
    /// as anomalies rather than acting on them.
    pub oscillated: Vec<u32>,
}

/// Tracks which subtask indices have ever been verified complete for one
/// task. One tracker per in-flight task; seeded from disk on resume.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    satisfied: BTreeSet<u32>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild tracker state from already-persisted completions, so a
    /// resumed task does not re-announce subtasks the verifier satisfied
    /// before the crash.
    pub fn seeded(existing: &[SubtaskCompletion]) -> Self {
        Self {
            satisfied: existing.iter().map(|c| c.subtask_index).collect(),
        }
    }

    /// Diffs the verifier's currently-satisfied set against what this
    /// tracker has already recorded, at the given action-index step.
    pub fn observe(&mut self, currently_satisfied: &BTreeSet<u32>, at_step: u32) -> Observation {
        let mut newly_completed = Vec::new();
        for &index in currently_satisfied {
            if self.satisfied.insert(index) {
                newly_completed.push(SubtaskCompletion {
                    subtask_index: index,
                    completed_at: at_step,
                });
            }
        }

        let oscillated = self
            .satisfied
            .iter()
            .filter(|index| !currently_satisfied.contains(index))
            .copied()
            .collect();

        Observation {
            newly_completed,
            oscillated,
        }
    }

    pub fn is_satisfied(&self, subtask_index: u32) -> bool {
        self.satisfied.contains(&subtask_index)
    }

    /// A task is actually complete once every subtask it declares has been
    /// verified satisfied at least once (§3, §4.2). A task with no declared
    /// subtasks outside the combined regime still has exactly one, index 1.
    pub fn is_task_complete(&self, required_subtasks: &BTreeSet<u32>) -> bool {
        !required_subtasks.is_empty()
            && required_subtasks.iter().all(|s| self.satisfied.contains(s))
    }

    /// The step at which the last required subtask was satisfied, or `None`
    /// if the task never fully completed.
    pub fn completion_step(&self, required_subtasks: &BTreeSet<u32>, history: &[SubtaskCompletion]) -> Option<u32> {
        if !self.is_task_complete(required_subtasks) {
            return None;
        }
        required_subtasks
            .iter()
            .filter_map(|s| history.iter().find(|c| c.subtask_index == *s))
            .map(|c| c.completed_at)
            .max()
    }

    /// Builds the four-way accuracy verdict for one finalized task (§3,
    /// §4.2). `done_step` is the action index the agent issued its
    /// terminator at, if any; `None` maps to the `-1` sentinel.
    pub fn analyze(
        &self,
        required_subtasks: &BTreeSet<u32>,
        history: &[SubtaskCompletion],
        model_claimed_completion: bool,
        done_step: Option<u32>,
    ) -> CompletionAnalysis {
        let actually_completed = self.is_task_complete(required_subtasks);
        let actual_completion_step = self
            .completion_step(required_subtasks, history)
            .map(i64::from)
            .unwrap_or(-1);
        let done_step = done_step.map(i64::from).unwrap_or(-1);
        CompletionAnalysis::new(
            model_claimed_completion,
            actually_completed,
            done_step,
            actual_completion_step,
        )
    }
}

/// `anomalies` entries are free-form text surfaced verbatim into
/// `run_summary.json`; this is the single place that formats them so the
/// wording stays consistent across call sites.
pub fn oscillation_anomaly(scenario_id: &str, task_index: u32, subtask_index: u32, step: u32) -> String {
    format!(
        "scenario {scenario_id} task {task_index}: subtask {subtask_index} was previously verified complete but the verifier reported it unsatisfied again at step {step}; completion was retained"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newly_completed_subtasks_are_reported_once() {
        let mut tracker = CompletionTracker::new();
        let mut satisfied = BTreeSet::new();
        satisfied.insert(1);
        let obs = tracker.observe(&satisfied, 3);
        assert_eq!(obs.newly_completed.len(), 1);
        assert_eq!(obs.newly_completed[0].completed_at, 3);

        let obs2 = tracker.observe(&satisfied, 7);
        assert!(obs2.newly_completed.is_empty(), "already recorded, not repeated");
    }

    #[test]
    fn oscillation_does_not_unrecord_completion() {
        let mut tracker = CompletionTracker::new();
        let mut satisfied = BTreeSet::new();
        satisfied.insert(1);
        tracker.observe(&satisfied, 2);

        let empty = BTreeSet::new();
        let obs = tracker.observe(&empty, 5);
        assert_eq!(obs.oscillated, vec![1]);
        assert!(tracker.is_satisfied(1), "completion must survive the oscillation");
    }

    #[test]
    fn seeded_tracker_resumes_prior_completions() {
        let existing = vec![SubtaskCompletion {
            subtask_index: 2,
            completed_at: 4,
        }];
        let tracker = CompletionTracker::seeded(&existing);
        assert!(tracker.is_satisfied(2));
        assert!(!tracker.is_satisfied(1));
    }

    #[test]
    fn analyze_classifies_all_four_quadrants() {
        let mut required = BTreeSet::new();
        required.insert(1);
        let history = vec![SubtaskCompletion {
            subtask_index: 1,
            completed_at: 3,
        }];

        let mut tracker = CompletionTracker::new();
        tracker.observe(&required, 3);
        let correct = tracker.analyze(&required, &history, true, Some(4));
        assert_eq!(correct.accuracy, CompletionAccuracy::Correct);

        let premature = CompletionTracker::new().analyze(&required, &[], true, Some(1));
        assert_eq!(premature.accuracy, CompletionAccuracy::Premature);

        let missed = tracker.analyze(&required, &history, false, None);
        assert_eq!(missed.accuracy, CompletionAccuracy::Missed);

        let neither = CompletionTracker::new().analyze(&required, &[], false, None);
        assert_eq!(neither.accuracy, CompletionAccuracy::Neither);
    }
}
