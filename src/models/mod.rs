pub mod run_summary;
pub mod scenario;
pub mod trajectory;

pub use run_summary::{CategoryStatistics, RunInfo, RunSummary};
pub use scenario::{AgentCapabilities, AgentCountFilter, Scenario, Task, TaskCategory};
pub use trajectory::{
    ActionRecord, ActionStatus, CompletionAccuracy, CompletionAnalysis, FinalizeReason,
    SubtaskCompletion, TaskTrajectory,
};
