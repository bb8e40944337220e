//! Per-session state: the loop state, the conversation, and the outcome.
//!
//! A [`Session`] is owned by exactly one run of the loop. It stays
//! inspectable after the run ends, whatever the terminal state, so a failed
//! session can be diagnosed from the turns it accumulated.

use loopevents_core::decision::Decision;
use loopevents_core::error::{ProviderError, ToolError};
use loopevents_core::message::{Conversation, Message, SessionId};
use loopevents_core::state::LoopState;
use serde::Serialize;
use tracing::{debug, warn};

/// Why a session failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoopError {
    #[error("LLM provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool execution failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Iteration limit exceeded: {limit} tool executions")]
    IterationLimitExceeded { limit: u32 },

    #[error("Could not build decision request: {0}")]
    Decision(String),
}

/// How a session ended. Exactly one per finished session.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// The LLM replied without tool calls
    Completed { response: String },
    /// An adapter failed or the iteration limit was hit
    Failed(LoopError),
    /// The caller cancelled the session
    Cancelled,
}

impl SessionOutcome {
    /// The terminal loop state this outcome maps to.
    pub fn terminal_state(&self) -> LoopState {
        match self {
            Self::Completed { .. } => LoopState::Done,
            Self::Failed(_) => LoopState::Failed,
            Self::Cancelled => LoopState::Cancelled,
        }
    }
}

/// One end-to-end run of the loop.
#[derive(Debug)]
pub struct Session {
    state: LoopState,
    history: Vec<LoopState>,
    conversation: Conversation,
    decisions: Vec<Decision>,
    tool_executions: u32,
    outcome: Option<SessionOutcome>,
}

impl Session {
    /// A fresh session waiting for its prompt.
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            state: LoopState::AwaitingPrompt,
            history: vec![LoopState::AwaitingPrompt],
            conversation: Conversation::with_id(id),
            decisions: Vec::new(),
            tool_executions: 0,
            outcome: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.conversation.id
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Every state the session has been in, oldest first.
    pub fn history(&self) -> &[LoopState] {
        &self.history
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Decisions made so far, one per decision round.
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn tool_executions(&self) -> u32 {
        self.tool_executions
    }

    /// `None` until the session reaches a terminal state.
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// The final response, if the session completed.
    pub fn final_response(&self) -> Option<&str> {
        match &self.outcome {
            Some(SessionOutcome::Completed { response }) => Some(response.as_str()),
            _ => None,
        }
    }

    /// The failure cause, if the session failed.
    pub fn error(&self) -> Option<&LoopError> {
        match &self.outcome {
            Some(SessionOutcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// Serializable summary for logs and the CLI.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id().to_string(),
            state: self.state,
            turns: self.conversation.len(),
            decision_rounds: self.decisions.len(),
            fallback_decisions: self.decisions.iter().filter(|d| d.is_fallback()).count(),
            tool_executions: self.tool_executions,
            error: self.error().map(|e| e.to_string()),
        }
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.conversation.push(message);
    }

    pub(crate) fn record_decision(&mut self, decision: Decision) {
        self.conversation.push(Message::decision(&decision));
        self.decisions.push(decision);
    }

    pub(crate) fn count_tool_execution(&mut self) {
        self.tool_executions += 1;
    }

    pub(crate) fn transition(&mut self, next: LoopState) {
        if !self.state.can_transition_to(next) {
            warn!(
                session_id = %self.id(),
                from = %self.state,
                to = %next,
                "Ignoring invalid loop state transition"
            );
            return;
        }
        debug!(session_id = %self.id(), from = %self.state, to = %next, "Loop state transition");
        self.state = next;
        self.history.push(next);
    }

    pub(crate) fn finish(&mut self, outcome: SessionOutcome) {
        self.transition(outcome.terminal_state());
        self.outcome = Some(outcome);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Compact view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub state: LoopState,
    pub turns: usize,
    pub decision_rounds: usize,
    pub fallback_decisions: usize,
    pub tool_executions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
