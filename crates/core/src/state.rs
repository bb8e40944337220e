//! Loop state of one session.

use serde::{Deserialize, Serialize};

/// Where a session is in the iterate-until-done cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingPrompt,
    AwaitingLlm,
    AwaitingDecision,
    ExecutingTool,
    Done,
    Failed,
    Cancelled,
}

impl LoopState {
    /// Terminal states are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows `self → next`.
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            // Any live state may fail or be cancelled.
            (_, Failed | Cancelled) => true,
            (AwaitingPrompt, AwaitingLlm) => true,
            (AwaitingLlm, Done | AwaitingDecision) => true,
            (AwaitingDecision, ExecutingTool) => true,
            (ExecutingTool, AwaitingLlm) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingPrompt => "awaiting_prompt",
            Self::AwaitingLlm => "awaiting_llm",
            Self::AwaitingDecision => "awaiting_decision",
            Self::ExecutingTool => "executing_tool",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
