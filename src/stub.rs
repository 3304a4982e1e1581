//! Reference `Simulator`/`Agent` implementations (§1: both are external
//! collaborators this core only specifies the contract for). The binary
//! wires these in by default so the CLI is runnable end to end; a real
//! deployment links a physical simulator and LLM-backed agent against the
//! same traits instead.

use std::collections::{BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::{Agent, AgentFactory, Decision, QaRecord};
use crate::config::AgentMode;
use crate::error::EvalError;
use crate::models::scenario::{AgentCapabilities, Task};
use crate::simulator::{ApplyOutcome, ApplyStatus, Simulator, SimulatorFactory};

/// A deterministic in-memory world: `apply` records a `SET <key> <value>`
/// convention into a flat map, everything else is accepted unconditionally.
/// `verify_subtasks` reads `{"at_or_after_total_actions": N}` from a task's
/// opaque verifier payload and is satisfied once that many actions have been
/// applied since the last [`Simulator::reset`].
pub struct StubSimulator {
    scene: Value,
    total_actions: u32,
    world: HashMap<String, Value>,
}

impl StubSimulator {
    pub fn new(scene: Value) -> Self {
        Self {
            scene,
            total_actions: 0,
            world: HashMap::new(),
        }
    }
}

#[async_trait]
impl Simulator for StubSimulator {
    async fn describe_environment(
        &self,
        agent_id: Option<&str>,
        _detail_level: &str,
        _show_properties: bool,
        _only_discovered: bool,
    ) -> Result<String, EvalError> {
        let who = agent_id.unwrap_or("agent");
        Ok(format!(
            "{who} observes a scene with {} known facts",
            self.world.len()
        ))
    }

    async fn apply(&mut self, agent_id: &str, command: &str) -> Result<ApplyOutcome, EvalError> {
        self.total_actions += 1;

        if command.eq_ignore_ascii_case("invalid") {
            return Ok(ApplyOutcome {
                status: ApplyStatus::Invalid,
                message: "unrecognized command".to_string(),
                result: None,
            });
        }
        if command.eq_ignore_ascii_case("fail") {
            return Ok(ApplyOutcome {
                status: ApplyStatus::Failure,
                message: "command could not be executed".to_string(),
                result: None,
            });
        }

        if let Some(rest) = command.strip_prefix("SET ") {
            if let Some((key, value)) = rest.split_once(' ') {
                self.world.insert(key.to_string(), Value::String(value.to_string()));
            }
        }

        Ok(ApplyOutcome {
            status: ApplyStatus::Success,
            message: format!("{agent_id} executed {command}"),
            result: None,
        })
    }

    async fn verify_subtasks(&self, task: &Task) -> Result<BTreeSet<u32>, EvalError> {
        let mut satisfied = BTreeSet::new();
        if let Some(threshold) = task.verifier.get("at_or_after_total_actions").and_then(Value::as_u64)
            && self.total_actions as u64 >= threshold
        {
            satisfied.insert(1);
        }
        Ok(satisfied)
    }

    async fn reset(&mut self) -> Result<(), EvalError> {
        self.total_actions = 0;
        self.world.clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct StubSimulatorFactory;

#[async_trait]
impl SimulatorFactory for StubSimulatorFactory {
    type Handle = StubSimulator;

    async fn initialize(
        &self,
        scene: &Value,
        _agent_configs: &[AgentCapabilities],
    ) -> Result<Self::Handle, EvalError> {
        Ok(StubSimulator::new(scene.clone()))
    }
}

/// Plays back a fixed script of commands, falling back to a terminator once
/// exhausted so a task always ends rather than running out the step budget.
pub struct StubAgent {
    script: VecDeque<String>,
}

impl StubAgent {
    pub fn new(script: Vec<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl Agent for StubAgent {
    async fn set_task(&mut self, _description: &str) -> Result<(), EvalError> {
        Ok(())
    }

    async fn decide(&mut self, _environment_description: &str) -> Result<Decision, EvalError> {
        let command = self.script.pop_front().unwrap_or_else(|| "DONE".to_string());
        Ok(Decision {
            raw_response: command.clone(),
            extracted_command: command,
        })
    }

    async fn reset(&mut self) -> Result<(), EvalError> {
        Ok(())
    }

    async fn record_qa(&mut self, _qa: &QaRecord) -> Result<(), EvalError> {
        Ok(())
    }
}

/// Always spawns an empty-scripted [`StubAgent`] (issues `DONE` immediately).
/// A real deployment's factory constructs LLM-backed agents here instead.
#[derive(Default)]
pub struct StubAgentFactory;

#[async_trait]
impl AgentFactory for StubAgentFactory {
    type Handle = StubAgent;

    async fn spawn(&self, _agent_id: &str, _agent_mode: AgentMode) -> Result<Self::Handle, EvalError> {
        Ok(StubAgent::new(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_command_is_recorded_and_verifier_reads_action_count() {
        let mut sim = StubSimulator::new(Value::Null);
        let task = Task {
            task_index: 1,
            description: "turn on the light".into(),
            category: crate::models::TaskCategory::DirectCommand,
            verifier: serde_json::json!({"at_or_after_total_actions": 2}),
        };

        assert!(sim.verify_subtasks(&task).await.unwrap().is_empty());
        sim.apply("a1", "SET light on").await.unwrap();
        assert!(sim.verify_subtasks(&task).await.unwrap().is_empty());
        sim.apply("a1", "GOTO room_a").await.unwrap();
        assert_eq!(sim.verify_subtasks(&task).await.unwrap(), BTreeSet::from([1]));
    }

    #[tokio::test]
    async fn reset_clears_action_count_and_world_state() {
        let mut sim = StubSimulator::new(Value::Null);
        sim.apply("a1", "SET door open").await.unwrap();
        sim.reset().await.unwrap();
        assert_eq!(sim.total_actions, 0);
        assert!(sim.world.is_empty());
    }

    #[tokio::test]
    async fn scripted_agent_falls_back_to_terminator() {
        let mut agent = StubAgent::new(vec!["GOTO room_a".to_string()]);
        assert_eq!(agent.decide("env").await.unwrap().extracted_command, "GOTO room_a");
        assert_eq!(agent.decide("env").await.unwrap().extracted_command, "DONE");
        assert_eq!(agent.decide("env").await.unwrap().extracted_command, "DONE");
    }
}
