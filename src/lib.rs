//! Evaluation orchestration core for embodied-AI benchmarking (§1).
//!
//! This crate drives scripted physical-task scenarios through an agent and a
//! text-based world simulator, records per-step subtask satisfaction, and
//! aggregates the results into a run summary. The simulator and the agent's
//! LLM backend are external collaborators; [`simulator`] and [`agent`] only
//! define the traits this core calls across.

pub mod agent;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod models;
pub mod runner;
pub mod selector;
pub mod simulator;
pub mod store;
pub mod stub;
pub mod tracker;
pub mod worker;

pub use error::{EvalError, EvalResult};
