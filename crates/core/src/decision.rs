//! Decision round value types.
//!
//! One round: the loop builds a [`DecisionRequest`], every scheduler may
//! answer with a [`SchedulerResponse`], and the reducer folds those answers
//! into exactly one [`Decision`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::message::{Conversation, SessionId};

/// What is being decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Which requested tool to execute next
    ToolResolution,
    /// Which agent should take a task
    AgentResolution,
    /// Which context-management strategy to apply
    ContextResolution,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolResolution => "tool_resolution",
            Self::AgentResolution => "agent_resolution",
            Self::ContextResolution => "context_resolution",
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The event published to schedulers. Immutable once built.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    id: String,
    session_id: SessionId,
    kind: DecisionKind,
    candidates: Vec<String>,
    conversation: Arc<Conversation>,
    created_at: DateTime<Utc>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl DecisionRequest {
    /// Build a request over `candidates`.
    ///
    /// Duplicate candidates are collapsed, keeping first-seen order.
    /// Fails if no candidate remains.
    pub fn new(
        kind: DecisionKind,
        session_id: SessionId,
        candidates: impl IntoIterator<Item = impl Into<String>>,
        conversation: Arc<Conversation>,
    ) -> Result<Self> {
        let mut distinct: Vec<String> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.into();
            if !distinct.contains(&candidate) {
                distinct.push(candidate);
            }
        }

        if distinct.is_empty() {
            return Err(Error::EmptyCandidates {
                kind: kind.to_string(),
            });
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            kind,
            candidates: distinct,
            conversation,
            created_at: Utc::now(),
            metadata: serde_json::Map::new(),
        })
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Candidate options in the order the loop supplied them. Never empty.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Conversation snapshot taken when the request was built.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    pub fn is_candidate(&self, option: &str) -> bool {
        self.candidates.iter().any(|c| c == option)
    }

    /// The option used when no scheduler produced a valid response.
    pub fn fallback_option(&self) -> &str {
        // Non-empty by construction.
        &self.candidates[0]
    }
}

/// One scheduler's answer to a decision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerResponse {
    /// The option the scheduler prefers
    pub option: String,

    /// Preference strength; higher wins. Responses without a usable score
    /// are excluded from reduction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Free-form explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// Scheduler-specific data, opaque to the core
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SchedulerResponse {
    /// A scored response with no rationale.
    pub fn new(option: impl Into<String>, score: f64) -> Self {
        Self {
            option: option.into(),
            score: Some(score),
            rationale: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// The score if it is a number the reducer can order.
    pub fn usable_score(&self) -> Option<f64> {
        self.score.filter(|s| !s.is_nan())
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// A registered scheduler's response won
    Scheduler { id: String },
    /// No valid response; the first candidate was used
    Fallback,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduler { id } => write!(f, "scheduler:{id}"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// The reduced outcome of one decision round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// The chosen option; always one of the request's candidates
    pub option: String,

    /// Winning score, or `None` when the fallback was used
    pub score: Option<f64>,

    pub provenance: Provenance,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// Schedulers whose responses were excluded as invalid
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<String>,
}

impl Decision {
    pub fn is_fallback(&self) -> bool {
        matches!(self.provenance, Provenance::Fallback)
    }
}
