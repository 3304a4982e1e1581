//! Simulator contract consumed by C4/C5 (§6).
//!
//! The simulator itself is an external collaborator (§1 Non-goals); this
//! module only defines the boundary the evaluation core calls across.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EvalError;
use crate::models::scenario::AgentCapabilities;
use crate::models::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Success,
    Failure,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub status: ApplyStatus,
    pub message: String,
    pub result: Option<Value>,
}

/// One live simulator instance, seeded with a scene and agent roster.
///
/// The executor never enumerates specific commands (§9 "dynamic dispatch on
/// action command → simulator-owned"): every non-terminator token reaches
/// [`Simulator::apply`] and the simulator's own validation is authoritative.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Natural-language environment description at the configured detail
    /// level (§4.4 step 1).
    async fn describe_environment(
        &self,
        agent_id: Option<&str>,
        detail_level: &str,
        show_properties: bool,
        only_discovered: bool,
    ) -> Result<String, EvalError>;

    /// Apply a raw command string issued by an agent.
    async fn apply(&mut self, agent_id: &str, command: &str) -> Result<ApplyOutcome, EvalError>;

    /// Currently-satisfied subtask indices for the given task (§4.2).
    /// Outside the `combined` regime a task has exactly one subtask, index 1.
    async fn verify_subtasks(&self, task: &Task) -> Result<BTreeSet<u32>, EvalError>;

    /// Re-seed from the original scene (independent regime only, §4.4).
    async fn reset(&mut self) -> Result<(), EvalError>;
}

/// Constructs a fresh [`Simulator`] from a scene and agent roster: the
/// `initialize(scene, agent_configs) -> SimulatorHandle` entry point of §6,
/// expressed as a factory trait so C5 can instantiate per-scenario and
/// per-independent-task simulators without depending on a concrete type.
#[async_trait]
pub trait SimulatorFactory: Send + Sync {
    type Handle: Simulator;

    async fn initialize(
        &self,
        scene: &Value,
        agent_configs: &[AgentCapabilities],
    ) -> Result<Self::Handle, EvalError>;
}
