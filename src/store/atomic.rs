//! Atomic write discipline (§4.1): every mutation writes the full updated
//! artifact to a temporary sibling file, fsyncs it, then renames it onto the
//! target path. Readers on restart see either the pre- or post-write state,
//! never a torn one, and no in-memory buffering survives across the await
//! point: the write either lands whole or not at all.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::EvalError;

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{file_name}.tmp"))
}

fn storage_err(path: &Path, reason: impl std::fmt::Display) -> EvalError {
    EvalError::Storage {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

pub async fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_err(path, e))?;
    }
    let tmp = sibling_tmp_path(path);
    {
        let mut f = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| storage_err(&tmp, e))?;
        f.write_all(bytes).await.map_err(|e| storage_err(&tmp, e))?;
        f.sync_all().await.map_err(|e| storage_err(&tmp, e))?;
    }
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| storage_err(path, e))?;
    // Best-effort: fsync the containing directory so the rename itself
    // survives a crash, not just the file contents.
    if let Some(parent) = path.parent()
        && let Ok(dir) = tokio::fs::File::open(parent).await
    {
        let _ = dir.sync_all().await;
    }
    Ok(())
}

pub async fn atomic_write_json<T: serde::Serialize + Sync>(
    path: &Path,
    value: &T,
) -> Result<(), EvalError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| storage_err(path, e))?;
    atomic_write_bytes(path, &bytes).await
}

/// Load a JSON artifact if it exists, returning `None` on first run and an
/// error only if the file exists but is unreadable or malformed; the
/// atomic-write discipline guarantees it is never torn.
pub async fn load_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, EvalError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| storage_err(path, e))?;
    let value = serde_json::from_str(&content).map_err(|e| storage_err(path, e))?;
    Ok(Some(value))
}
