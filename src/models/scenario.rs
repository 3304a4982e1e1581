//! Scenario and task data model (§3).

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed tag set named in §3, with an escape hatch for categories the
/// data-generation pipeline adds later. The core must not need a release
/// to recognize a new category string, it only needs to bucket it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskCategory {
    DirectCommand,
    AttributeReasoning,
    ToolUse,
    CompoundReasoning,
    ExplicitCollaboration,
    ImplicitCollaboration,
    CompoundCollaboration,
    Other(String),
}

impl TaskCategory {
    pub fn as_str(&self) -> &str {
        match self {
            TaskCategory::DirectCommand => "direct_command",
            TaskCategory::AttributeReasoning => "attribute_reasoning",
            TaskCategory::ToolUse => "tool_use",
            TaskCategory::CompoundReasoning => "compound_reasoning",
            TaskCategory::ExplicitCollaboration => "explicit_collaboration",
            TaskCategory::ImplicitCollaboration => "implicit_collaboration",
            TaskCategory::CompoundCollaboration => "compound_collaboration",
            TaskCategory::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TaskCategory {
    fn from(value: &str) -> Self {
        match value {
            "direct_command" => TaskCategory::DirectCommand,
            "attribute_reasoning" => TaskCategory::AttributeReasoning,
            "tool_use" => TaskCategory::ToolUse,
            "compound_reasoning" => TaskCategory::CompoundReasoning,
            "explicit_collaboration" => TaskCategory::ExplicitCollaboration,
            "implicit_collaboration" => TaskCategory::ImplicitCollaboration,
            "compound_collaboration" => TaskCategory::CompoundCollaboration,
            other => TaskCategory::Other(other.to_string()),
        }
    }
}

impl Serialize for TaskCategory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(TaskCategory::from(s.as_str()))
    }
}

/// Required-agent-count filter from `--agent-count-filter` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCountFilter {
    Single,
    Multi,
    All,
}

/// One agent's capability record within a scenario's `agent_configs` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub agent_id: String,
    #[serde(default)]
    pub weight_limit: Option<f64>,
    #[serde(default)]
    pub grasp_count: Option<u32>,
    #[serde(default)]
    pub abilities: Vec<String>,
}

/// One unit of work within a scenario (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_index: u32,
    pub description: String,
    pub category: TaskCategory,
    /// Opaque data consumed by the simulator's verifier; the core never
    /// interprets its contents (§1 Non-goals: task content/physical semantics).
    #[serde(default)]
    pub verifier: Value,
}

/// One benchmark instance (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    /// Simulator-specific description of rooms, objects, initial state.
    /// Opaque to the core beyond being handed to `Simulator::initialize`.
    pub scene: Value,
    pub tasks: Vec<Task>,
    pub agent_configs: Vec<AgentCapabilities>,
}

impl Scenario {
    pub fn is_single_agent(&self) -> bool {
        self.agent_configs.len() == 1
    }

    pub fn is_multi_agent(&self) -> bool {
        self.agent_configs.len() >= 2
    }

    pub fn has_category(&self, categories: &std::collections::HashSet<TaskCategory>) -> bool {
        self.tasks.iter().any(|t| categories.contains(&t.category))
    }

    /// Zero-padded-compatible lexicographic scenario id, used by the range
    /// selection mode (§4.3).
    pub fn id_in_range(id: &str, start: &str, end: &str) -> bool {
        id >= start && id <= end
    }
}

/// Reads `scene/<scenario_id>_scene.json` from the dataset root.
pub fn scene_path(dataset_root: &Path, scenario_id: &str) -> std::path::PathBuf {
    dataset_root
        .join("scene")
        .join(format!("{scenario_id}_scene.json"))
}

/// Reads `task/<scenario_id>_task.json` from the dataset root.
pub fn task_path(dataset_root: &Path, scenario_id: &str) -> std::path::PathBuf {
    dataset_root
        .join("task")
        .join(format!("{scenario_id}_task.json"))
}

/// Reads the optional `task/<scenario_id>_verify.json` override.
pub fn verify_path(dataset_root: &Path, scenario_id: &str) -> std::path::PathBuf {
    dataset_root
        .join("task")
        .join(format!("{scenario_id}_verify.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_json() {
        let cat = TaskCategory::ToolUse;
        let json = serde_json::to_string(&cat).unwrap();
        assert_eq!(json, "\"tool_use\"");
        let back: TaskCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cat);
    }

    #[test]
    fn unknown_category_round_trips_as_other() {
        let json = "\"future_category\"";
        let cat: TaskCategory = serde_json::from_str(json).unwrap();
        assert_eq!(cat, TaskCategory::Other("future_category".to_string()));
        assert_eq!(serde_json::to_string(&cat).unwrap(), json);
    }

    #[test]
    fn agent_count_predicates() {
        let mut scenario = Scenario {
            scenario_id: "00001".into(),
            scene: Value::Null,
            tasks: vec![],
            agent_configs: vec![AgentCapabilities {
                agent_id: "a1".into(),
                weight_limit: None,
                grasp_count: None,
                abilities: vec![],
            }],
        };
        assert!(scenario.is_single_agent());
        assert!(!scenario.is_multi_agent());
        scenario.agent_configs.push(AgentCapabilities {
            agent_id: "a2".into(),
            weight_limit: None,
            grasp_count: None,
            abilities: vec![],
        });
        assert!(!scenario.is_single_agent());
        assert!(scenario.is_multi_agent());
    }
}
