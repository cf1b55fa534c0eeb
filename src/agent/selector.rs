//! The operation-selection boundary
//!
//! The orchestrator asks a `Selector` what to do next given the utterance,
//! a snapshot of the conversation, the catalog, and the steps already taken
//! this turn. Production backs this with an LLM; tests and offline runs use
//! the deterministic rule table.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::EmployeeId;
use crate::ops::{OpDefinition, OpName};

/// Read-only view of the conversation handed to the selector.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    pub resolved_employee: Option<EmployeeId>,
    /// Oldest first.
    pub recent_turns: Vec<(String, String)>,
}

/// One executed (or refused) step this turn, visible to later selections.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub op: OpName,
    pub args: Value,
    /// One-line outcome for the selection scratchpad.
    pub summary: String,
    /// Employee id surfaced by this step, if any - lets a later step chain
    /// "resolve person" into "fetch their summary".
    pub resolved_employee: Option<EmployeeId>,
    pub success: bool,
}

/// What to do next within the current turn.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Run one catalog operation.
    Invoke { op: OpName, args: Value },
    /// Stop and ask the user for one missing argument; the operation parks
    /// in the session until the next utterance supplies it.
    Clarify {
        op: OpName,
        args: Value,
        field: &'static str,
    },
    /// Stop selecting; optionally say something beyond the operation
    /// outputs.
    Respond { text: Option<String> },
}

/// Selection backend failure; surfaced as a recoverable per-turn error.
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("selection backend unavailable: {0}")]
    Backend(String),
}

/// Chooses the next operation for a turn.
///
/// Implementations must be deterministic given the same utterance, context
/// snapshot and prior step records.
#[async_trait]
pub trait Selector: Send + Sync {
    async fn select(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
        catalog: &[OpDefinition],
        prior_steps: &[StepRecord],
    ) -> Result<Decision, SelectorError>;
}
