//! Dataset layout reader (§6): `scene/<id>_scene.json`, `task/<id>_task.json`,
//! optional `task/<id>_verify.json`.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::EvalError;
use crate::models::scenario::{scene_path, task_path, verify_path};
use crate::models::Scenario;

/// Every scenario id with a task file present under `dataset_root/task/`.
pub fn discover_scenario_ids(dataset_root: &Path) -> Result<Vec<String>, EvalError> {
    let task_dir = dataset_root.join("task");
    let entries = std::fs::read_dir(&task_dir).map_err(|e| {
        EvalError::Configuration(format!("cannot read task directory {task_dir:?}: {e}"))
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EvalError::Configuration(e.to_string()))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(id) = name.strip_suffix("_task.json") {
            ids.push(id.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Load one scenario's scene, task list, and optional verify overlay,
/// merging the verify file into each task's `verifier` field when present.
pub fn load_scenario(dataset_root: &Path, scenario_id: &str) -> Result<Scenario, EvalError> {
    let scene_p = scene_path(dataset_root, scenario_id);
    let task_p = task_path(dataset_root, scenario_id);

    let scene_json = read_json(&scene_p).map_err(|reason| EvalError::ScenarioLoad {
        scenario_id: scenario_id.to_string(),
        reason,
    })?;
    let task_json = read_json(&task_p).map_err(|reason| EvalError::ScenarioLoad {
        scenario_id: scenario_id.to_string(),
        reason,
    })?;

    let mut scenario: Scenario =
        serde_json::from_value(task_json).map_err(|e| EvalError::ScenarioLoad {
            scenario_id: scenario_id.to_string(),
            reason: format!("task file does not match scenario schema: {e}"),
        })?;
    scenario.scene = scene_json;
    scenario.scenario_id = scenario_id.to_string();

    let verify_p = verify_path(dataset_root, scenario_id);
    if verify_p.exists() {
        let verify_json = read_json(&verify_p).map_err(|reason| EvalError::ScenarioLoad {
            scenario_id: scenario_id.to_string(),
            reason,
        })?;
        apply_verify_overlay(&mut scenario, verify_json);
    }

    Ok(scenario)
}

/// A `_verify.json` file is a map from `task_index` (as a string key) to the
/// verifier payload that replaces the task file's inline `verifier` field.
fn apply_verify_overlay(scenario: &mut Scenario, overlay: Value) {
    let Some(map) = overlay.as_object() else {
        return;
    };
    for task in &mut scenario.tasks {
        if let Some(v) = map.get(&task.task_index.to_string()) {
            task.verifier = v.clone();
        }
    }
}

fn read_json(path: &PathBuf) -> Result<Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {path:?}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| format!("failed to parse {path:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn discovers_ids_from_task_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("task/00001_task.json"), "{}");
        write(&dir.path().join("task/00002_task.json"), "{}");
        let ids = discover_scenario_ids(dir.path()).unwrap();
        assert_eq!(ids, vec!["00001", "00002"]);
    }

    #[test]
    fn loads_scene_and_task_and_merges_verify_overlay() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("scene/00001_scene.json"),
            r#"{"rooms": []}"#,
        );
        write(
            &dir.path().join("task/00001_task.json"),
            r#"{
                "scenario_id": "00001",
                "scene": null,
                "tasks": [{"task_index": 1, "description": "grab the cup", "category": "direct_command", "verifier": null}],
                "agent_configs": [{"agent_id": "a1", "abilities": []}]
            }"#,
        );
        write(
            &dir.path().join("task/00001_verify.json"),
            r#"{"1": {"target": "cup"}}"#,
        );

        let scenario = load_scenario(dir.path(), "00001").unwrap();
        assert_eq!(scenario.scene, serde_json::json!({"rooms": []}));
        assert_eq!(scenario.tasks[0].verifier, serde_json::json!({"target": "cup"}));
    }

    #[test]
    fn missing_task_file_is_a_scenario_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scenario(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, EvalError::ScenarioLoad { .. }));
    }
}
