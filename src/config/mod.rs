pub mod settings;

pub use settings::{
    AgentMode, RetryPolicy, RunConfig, RunSpec, ScenarioSelection, TaskFilter, TaskRegime,
};
