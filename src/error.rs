//! Error taxonomy for the evaluation core (§7).
//!
//! Call sites inside the library match on [`EvalError`] variants; the CLI
//! boundary wraps everything in `anyhow` for human-readable context, the
//! same split `main.rs` uses for file I/O.

use std::path::PathBuf;

use thiserror::Error;

/// One of the eight failure classes the evaluation core distinguishes.
///
/// Only [`EvalError::Configuration`] is fatal to the whole process; every
/// other variant is caught at the task or scenario boundary and recorded
/// rather than propagated (§7 propagation policy).
#[derive(Debug, Error)]
pub enum EvalError {
    /// Malformed RunSpec, unknown regime, or a missing dataset path.
    /// Fatal before any scenario starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The scene/task/verify file for a scenario was missing or malformed.
    /// The scenario is skipped; the run continues.
    #[error("failed to load scenario {scenario_id}: {reason}")]
    ScenarioLoad { scenario_id: String, reason: String },

    /// The simulator rejected a command outright (malformed action syntax).
    #[error("invalid action: {0}")]
    ActionInvalid(String),

    /// The simulator attempted and failed to execute a valid-looking command.
    #[error("action failed: {0}")]
    ActionFailure(String),

    /// The simulator raised while applying a command or computing verification.
    #[error("simulator fault: {0}")]
    SimulatorFault(String),

    /// The agent/LLM client raised, after the retry policy was exhausted.
    #[error("agent fault: {0}")]
    AgentFault(String),

    /// A per-call or per-scenario timeout elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Cooperative shutdown requested (SIGINT/SIGTERM).
    #[error("interrupted")]
    Interrupted,

    /// A trajectory store write failed.
    #[error("storage error at {path}: {reason}")]
    Storage { path: PathBuf, reason: String },
}

pub type EvalResult<T> = Result<T, EvalError>;
