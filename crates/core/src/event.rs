//! Lifecycle events: observational hooks around a session.
//!
//! The loop publishes a [`LoopEvent`] whenever something interesting happens.
//! Subscribers (audit log, metrics, UI) react without being able to steer
//! the loop; steering is what schedulers are for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::decision::{DecisionKind, Provenance};
use crate::state::LoopState;

/// How bad an [`ErrorEvent`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Structured error record for telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Machine-readable category, e.g. "provider_failed", "scheduler_timeout"
    pub error_type: String,

    pub error_message: String,

    pub severity: Severity,

    /// What the loop did instead, e.g. "fallback", "abstain"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ErrorEvent {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>, severity: Severity) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            severity,
            fallback_used: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback_used = Some(fallback.into());
        self
    }
}

/// All lifecycle events of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// A prompt was accepted and the loop started
    SessionStarted {
        session_id: String,
        prompt_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A decision request was broadcast
    DecisionRequested {
        session_id: String,
        request_id: String,
        kind: DecisionKind,
        candidates: Vec<String>,
        listeners: usize,
        timestamp: DateTime<Utc>,
    },

    /// A decision round was reduced
    DecisionMade {
        session_id: String,
        request_id: String,
        option: String,
        provenance: Provenance,
        score: Option<f64>,
        responses: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        session_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Something went wrong (recoverable or not)
    ErrorOccurred {
        session_id: String,
        error: ErrorEvent,
        timestamp: DateTime<Utc>,
    },

    /// The session reached a terminal state
    SessionEnded {
        session_id: String,
        state: LoopState,
        tool_executions: u32,
        timestamp: DateTime<Utc>,
    },
}

impl LoopEvent {
    /// Hook-style name for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session:start",
            Self::DecisionRequested { .. } => "decision:requested",
            Self::DecisionMade { .. } => "decision:made",
            Self::ToolExecuted { .. } => "tool:post",
            Self::ErrorOccurred { .. } => "error",
            Self::SessionEnded { .. } => "session:end",
        }
    }
}

/// A broadcast-based bus for lifecycle events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Slow subscribers lag and lose events; the loop never waits on them.
pub struct EventBus {
    sender: broadcast::Sender<Arc<LoopEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: LoopEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LoopEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
