//! Scheduler trait: the capability every decision listener implements.
//!
//! Schedulers are external collaborators. The core never scores options
//! itself; it only asks every registered scheduler and reduces the answers.

use async_trait::async_trait;
use std::sync::Arc;

use crate::decision::{DecisionRequest, SchedulerResponse};
use crate::error::SchedulerError;

/// A listener that scores candidate options for a decision request.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// A human-readable name (e.g., "cost-aware", "round-robin").
    fn name(&self) -> &str;

    /// Answer a decision request.
    ///
    /// `Ok(None)` is an explicit abstention. Errors are isolated by the bus
    /// and count as abstention too.
    async fn on_decision_request(
        &self,
        request: &DecisionRequest,
    ) -> std::result::Result<Option<SchedulerResponse>, SchedulerError>;
}

/// A scheduler as held by the registry.
#[derive(Clone)]
pub struct SchedulerRegistration {
    /// Registry key; unique within a registry
    pub id: String,

    /// The listener handle
    pub scheduler: Arc<dyn Scheduler>,

    /// Scheduler-specific configuration, opaque to the core
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl SchedulerRegistration {
    pub fn new(id: impl Into<String>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            id: id.into(),
            scheduler,
            config: serde_json::Map::new(),
        }
    }

    pub fn with_config(mut self, config: serde_json::Map<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }
}

impl std::fmt::Debug for SchedulerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerRegistration")
            .field("id", &self.id)
            .field("scheduler", &self.scheduler.name())
            .field("config", &self.config)
            .finish()
    }
}
