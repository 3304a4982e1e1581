//! C3 Scenario Selector (§4.3).

use std::path::Path;

use tracing::info;

use crate::config::{RunSpec, ScenarioSelection, TaskFilter};
use crate::dataset;
use crate::error::EvalError;
use crate::models::scenario::AgentCountFilter;

/// Resolve a run's scenario list: selection mode intersected with the task
/// filter. The filter only ever narrows the selection (§4.3).
pub fn select_scenarios(
    dataset_root: &Path,
    spec: &RunSpec,
) -> Result<Vec<String>, EvalError> {
    let selected = resolve_selection(dataset_root, &spec.scenario_selection)?;
    let before = selected.len();

    let filtered = apply_filter(dataset_root, selected, &spec.task_filter)?;
    let after = filtered.len();

    info!(
        before,
        after,
        filter = ?spec.task_filter,
        "scenario selection resolved"
    );

    if filtered.is_empty() {
        info!("scenario selection produced zero scenarios; run will complete with no work done");
    }

    Ok(filtered)
}

fn resolve_selection(
    dataset_root: &Path,
    selection: &ScenarioSelection,
) -> Result<Vec<String>, EvalError> {
    match selection {
        ScenarioSelection::All => dataset::discover_scenario_ids(dataset_root),
        ScenarioSelection::Range { start, end } => {
            let mut ids = dataset::discover_scenario_ids(dataset_root)?;
            ids.retain(|id| id.as_str() >= start.as_str() && id.as_str() <= end.as_str());
            Ok(ids)
        }
        ScenarioSelection::List { ids } => {
            let mut seen = std::collections::HashSet::new();
            let mut ordered = Vec::new();
            for id in ids {
                if seen.insert(id.clone()) {
                    ordered.push(id.clone());
                }
            }
            Ok(ordered)
        }
    }
}

fn apply_filter(
    dataset_root: &Path,
    candidates: Vec<String>,
    filter: &TaskFilter,
) -> Result<Vec<String>, EvalError> {
    if filter.is_empty() {
        return Ok(candidates);
    }

    let mut kept = Vec::new();
    for id in candidates {
        let scenario = match dataset::load_scenario(dataset_root, &id) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(scenario_id = %id, error = %e, "skipping unloadable scenario during filtering");
                continue;
            }
        };

        if let Some(categories) = &filter.categories
            && !scenario.has_category(categories)
        {
            continue;
        }

        if let Some(required) = filter.required_agent_count {
            let ok = match required {
                AgentCountFilter::Single => scenario.is_single_agent(),
                AgentCountFilter::Multi => scenario.is_multi_agent(),
                AgentCountFilter::All => true,
            };
            if !ok {
                continue;
            }
        }

        kept.push(id);
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentMode;
    use crate::config::TaskRegime;
    use std::collections::HashSet;
    use std::fs;

    fn write_scenario(dir: &Path, id: &str, category: &str, agent_count: usize) {
        fs::create_dir_all(dir.join("scene")).unwrap();
        fs::create_dir_all(dir.join("task")).unwrap();
        fs::write(dir.join(format!("scene/{id}_scene.json")), "{}").unwrap();
        let agents: Vec<_> = (0..agent_count)
            .map(|i| format!(r#"{{"agent_id": "a{i}", "abilities": []}}"#))
            .collect();
        fs::write(
            dir.join(format!("task/{id}_task.json")),
            format!(
                r#"{{
                    "scenario_id": "{id}",
                    "scene": null,
                    "tasks": [{{"task_index": 1, "description": "x", "category": "{category}", "verifier": null}}],
                    "agent_configs": [{}]
                }}"#,
                agents.join(",")
            ),
        )
        .unwrap();
    }

    fn base_spec(selection: ScenarioSelection, filter: TaskFilter) -> RunSpec {
        RunSpec {
            agent_mode: AgentMode::Single,
            task_regime: TaskRegime::Sequential,
            scenario_selection: selection,
            task_filter: filter,
            parallelism: 1,
            step_budget: 10,
            custom_suffix: String::new(),
        }
    }

    #[test]
    fn filter_intersects_selection_never_adds() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=10 {
            let id = format!("{i:05}");
            let (category, agents) = if i <= 3 {
                ("tool_use", 1)
            } else {
                ("direct_command", 2)
            };
            write_scenario(dir.path(), &id, category, agents);
        }

        let mut categories = HashSet::new();
        categories.insert(crate::models::TaskCategory::ToolUse);
        let filter = TaskFilter {
            categories: Some(categories),
            required_agent_count: Some(AgentCountFilter::Single),
        };
        let spec = base_spec(
            ScenarioSelection::Range {
                start: "00001".into(),
                end: "00010".into(),
            },
            filter,
        );

        let result = select_scenarios(dir.path(), &spec).unwrap();
        assert_eq!(result, vec!["00001", "00002", "00003"]);
    }

    #[test]
    fn empty_selection_returns_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("task")).unwrap();
        let spec = base_spec(ScenarioSelection::All, TaskFilter::default());
        let result = select_scenarios(dir.path(), &spec).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn list_mode_preserves_order_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let spec = base_spec(
            ScenarioSelection::List {
                ids: vec!["c".into(), "a".into(), "c".into(), "b".into()],
            },
            TaskFilter::default(),
        );
        let result = select_scenarios(dir.path(), &spec).unwrap();
        assert_eq!(result, vec!["c", "a", "b"]);
    }
}
