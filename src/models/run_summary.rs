//! `run_summary.json` shape (§4.6).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub agent_mode: String,
    pub task_regime: String,
    pub parallelism: usize,
    pub scenario_count: usize,
    pub selection_descriptor: String,
    pub interrupted: bool,
}

/// Per-category rollup: total, completed (verifier-judged), model-claimed,
/// and accuracy = completed/claimed (or 0 when nothing was claimed) (§4.6).
/// `accuracy` is a computed, persisted field rather than a plain method so
/// that `run_summary.json` carries all four numbers §4.6 names without a
/// reader having to recompute the ratio itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CategoryStatistics {
    pub total: u64,
    pub completed: u64,
    pub model_claimed: u64,
    pub accuracy: f64,
}

impl CategoryStatistics {
    /// `completed / total`; the rate that is reported never uses the
    /// model's claim as the numerator (§4.6, §8 property 6).
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    /// Agreement between claim and verifier truth, `completed / claimed`,
    /// zero when nothing was claimed.
    pub fn claim_accuracy(&self) -> f64 {
        if self.model_claimed == 0 {
            0.0
        } else {
            self.completed as f64 / self.model_claimed as f64
        }
    }

    /// Refreshes `accuracy` from the current counters; callers must invoke
    /// this after any counter change since `accuracy` is plain data, not a
    /// method, so it does not update itself.
    pub fn recompute_accuracy(&mut self) {
        self.accuracy = self.claim_accuracy();
    }

    pub fn merge(&mut self, other: &CategoryStatistics) {
        self.total += other.total;
        self.completed += other.completed;
        self.model_claimed += other.model_claimed;
        self.recompute_accuracy();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_info: RunInfo,
    pub task_category_statistics: BTreeMap<String, CategoryStatistics>,
    pub overall_summary: CategoryStatistics,
    /// Scenarios that failed to load or ran to a fatal error; never counted
    /// as completed in any statistic (§7).
    pub failed_scenarios: Vec<String>,
    /// Verifier-oscillation notes and other non-fatal anomalies surfaced so
    /// a reader of only the summary still sees them (§3).
    pub anomalies: Vec<String>,
}
