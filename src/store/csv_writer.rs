//! Shared run-wide `subtask_execution_log.csv` (§4.1, §6). Every worker
//! process appends to the same file, so each append takes an advisory
//! exclusive lock for the duration of the write and nothing longer.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use fs4::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

const CSV_HEADER: &[&str] = &[
    "timestamp",
    "scenario_id",
    "task_index",
    "task_description",
    "task_category",
    "agent_type",
    "status",
    "task_executed",
    "subtask_completed",
    "model_claimed_done",
    "actual_completion_step",
    "done_command_step",
    "total_steps",
    "successful_steps",
    "failed_steps",
    "command_success_rate",
    "start_time",
    "end_time",
    "duration_seconds",
    "llm_interactions",
];

/// One row of the fixed schema from §6, already field-ordered to match
/// [`CSV_HEADER`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvRow {
    pub timestamp: String,
    pub scenario_id: String,
    pub task_index: u32,
    pub task_description: String,
    pub task_category: String,
    pub agent_type: String,
    pub status: String,
    pub task_executed: bool,
    pub subtask_completed: bool,
    pub model_claimed_done: bool,
    pub actual_completion_step: i64,
    pub done_command_step: i64,
    pub total_steps: u32,
    pub successful_steps: u32,
    pub failed_steps: u32,
    pub command_success_rate: f64,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub llm_interactions: u32,
}

fn storage_err(path: &Path, reason: impl std::fmt::Display) -> EvalError {
    EvalError::Storage {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

pub async fn append_csv_row(csv_path: &Path, row: CsvRow) -> Result<(), EvalError> {
    let path: PathBuf = csv_path.to_path_buf();
    tokio::task::spawn_blocking(move || append_blocking(&path, &row))
        .await
        .map_err(|e| storage_err(csv_path, e))?
}

fn append_blocking(path: &Path, row: &CsvRow) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| storage_err(path, e))?;
    }
    let is_new = !path.exists();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| storage_err(path, e))?;
    file.lock_exclusive().map_err(|e| storage_err(path, e))?;

    let write_result = (|| -> Result<(), EvalError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(&file);
        if is_new {
            writer
                .write_record(CSV_HEADER)
                .map_err(|e| storage_err(path, e))?;
        }
        writer.serialize(row).map_err(|e| storage_err(path, e))?;
        writer.flush().map_err(|e| storage_err(path, e))?;
        Ok(())
    })();

    file.sync_all().map_err(|e| storage_err(path, e))?;
    FileExt::unlock(&file).map_err(|e| storage_err(path, e))?;
    write_result
}

/// Reads every row back (§4.6: the coordinator derives `run_summary.json`
/// from the CSV plus the per-scenario execution logs). Returns an empty
/// vector when the file does not exist yet, e.g. an interrupted run before
/// any task finished.
pub fn read_all_rows(path: &Path) -> Result<Vec<CsvRow>, EvalError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| storage_err(path, e))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| storage_err(path, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(scenario_id: &str) -> CsvRow {
        CsvRow {
            timestamp: "2026-08-01T00:00:00Z".into(),
            scenario_id: scenario_id.into(),
            task_index: 1,
            task_description: "grab the cup".into(),
            task_category: "direct_command".into(),
            agent_type: "single".into(),
            status: "success".into(),
            task_executed: true,
            subtask_completed: true,
            model_claimed_done: true,
            actual_completion_step: 3,
            done_command_step: 3,
            total_steps: 4,
            successful_steps: 4,
            failed_steps: 0,
            command_success_rate: 1.0,
            start_time: "2026-08-01T00:00:00Z".into(),
            end_time: "2026-08-01T00:00:05Z".into(),
            duration_seconds: 5.0,
            llm_interactions: 4,
        }
    }

    #[tokio::test]
    async fn first_append_writes_header_then_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        append_csv_row(&path, sample_row("00001")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        assert!(lines.next().unwrap().contains("00001"));
    }

    #[tokio::test]
    async fn second_append_does_not_repeat_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        append_csv_row(&path, sample_row("00001")).await.unwrap();
        append_csv_row(&path, sample_row("00002")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(&CSV_HEADER.join(",")).count(), 1);
        assert!(content.contains("00001"));
        assert!(content.contains("00002"));
    }
}
