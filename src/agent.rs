//! Agent contract consumed by C4 (§6).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::AgentMode;
use crate::error::EvalError;
use crate::models::trajectory::ActionStatus;

/// Raw prompt/response pair plus the extracted command, handed to
/// [`crate::store::ScenarioHandle::append_qa`] for observability (§4.4 step 3).
#[derive(Debug, Clone)]
pub struct QaRecord {
    pub agent_id: String,
    pub task_index: u32,
    pub action_index: u32,
    pub raw_prompt: String,
    pub raw_response: String,
    pub extracted_command: String,
}

/// One agent decision (§6 `decide`).
#[derive(Debug, Clone)]
pub struct Decision {
    pub raw_response: String,
    pub extracted_command: String,
}

/// Outcome of submitting the agent's record-keeping hook; never fails the
/// control loop on its own (observability only).
#[derive(Debug, Clone)]
pub struct RecordedQa {
    pub status: ActionStatus,
}

/// A single conversational agent (§6). Multi-agent scenarios hold one
/// instance per `agent_id`; the executor is agnostic to `agent_mode` beyond
/// how many instances it drives per step.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Installs the current goal description.
    async fn set_task(&mut self, description: &str) -> Result<(), EvalError>;

    /// Obtain the next action given the current environment description.
    /// Blocking/long-latency; callers apply the retry-with-timeout policy
    /// from [`crate::config::RunConfig`] (§5).
    async fn decide(&mut self, environment_description: &str) -> Result<Decision, EvalError>;

    /// Clears conversational state. Invoked between independent-regime
    /// tasks; never invoked between sequential-regime tasks (§4.4).
    async fn reset(&mut self) -> Result<(), EvalError>;

    /// Observability hook; the core calls this for every decision.
    async fn record_qa(&mut self, qa: &QaRecord) -> Result<(), EvalError>;
}

/// Constructs a fresh [`Agent`] for one roster slot: the "instantiate
/// agent(s) per `agent_mode`" step of §4.5. How `agent_mode` maps to the
/// number of live instances (one shared centralized planner vs. one
/// independent instance per `agent_id`) is a decision the factory owns; the
/// executor only ever sees a roster of `(agent_id, Box<dyn Agent>)` pairs.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    type Handle: Agent + 'static;

    async fn spawn(&self, agent_id: &str, agent_mode: AgentMode) -> Result<Self::Handle, EvalError>;
}

static TERMINATOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(done|finish(ed)?|task_complete|complete)\s*[.!]?\s*$")
        .expect("terminator pattern is a fixed literal")
});

/// Matches the terminator family case-insensitively against a small closed
/// set, tolerant of a trailing period or exclamation mark (§4.4: "DONE and
/// equivalents"). This is the only command vocabulary the executor
/// interprets directly; everything else is forwarded to the simulator
/// unmodified.
pub fn is_terminator(command: &str) -> bool {
    TERMINATOR_PATTERN.is_match(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_matching_is_case_insensitive_and_closed() {
        assert!(is_terminator("DONE"));
        assert!(is_terminator("  done  "));
        assert!(is_terminator("Finished"));
        assert!(!is_terminator("GOTO room_a"));
        assert!(!is_terminator("donezo"));
    }

    #[test]
    fn terminator_tolerates_trailing_punctuation() {
        assert!(is_terminator("Done."));
        assert!(is_terminator("task_complete!"));
    }
}
