//! C4 Task Executor (§4.4).

pub mod control_loop;
pub mod regimes;

pub use control_loop::{run_task, Roster, TaskOutcome, TaskSpec};
pub use regimes::{combined_regime, independent_regime, sequential_regime, COMBINED_TASK_INDEX};
