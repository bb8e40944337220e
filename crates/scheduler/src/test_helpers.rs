//! Shared scripted schedulers for unit tests.

use async_trait::async_trait;
use loopevents_core::decision::{DecisionKind, DecisionRequest, SchedulerResponse};
use loopevents_core::error::SchedulerError;
use loopevents_core::message::{Conversation, SessionId};
use loopevents_core::scheduler::Scheduler;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Build a tool-resolution request over `candidates`.
pub fn test_request(candidates: &[&str]) -> Arc<DecisionRequest> {
    Arc::new(
        DecisionRequest::new(
            DecisionKind::ToolResolution,
            SessionId::from("test-session"),
            candidates.iter().copied(),
            Arc::new(Conversation::new()),
        )
        .unwrap(),
    )
}

/// Always answers with the same option and score.
pub struct FixedScheduler {
    name: String,
    option: String,
    score: f64,
}

impl FixedScheduler {
    pub fn new(name: &str, option: &str, score: f64) -> Self {
        Self {
            name: name.into(),
            option: option.into(),
            score,
        }
    }
}

#[async_trait]
impl Scheduler for FixedScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        Ok(Some(SchedulerResponse::new(&self.option, self.score)))
    }
}

/// Always declines.
pub struct AbstainingScheduler;

#[async_trait]
impl Scheduler for AbstainingScheduler {
    fn name(&self) -> &str {
        "abstaining"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        Ok(None)
    }
}

/// Always errors.
pub struct FailingScheduler;

#[async_trait]
impl Scheduler for FailingScheduler {
    fn name(&self) -> &str {
        "failing"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        Err(SchedulerError::Failed {
            scheduler: "failing".into(),
            reason: "backend unavailable".into(),
        })
    }
}

/// Panics on every request.
pub struct PanickingScheduler;

#[async_trait]
impl Scheduler for PanickingScheduler {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        panic!("scheduler bug");
    }
}

/// Never answers.
pub struct SilentScheduler;

#[async_trait]
impl Scheduler for SilentScheduler {
    fn name(&self) -> &str {
        "silent"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        std::future::pending().await
    }
}

/// Answers after a delay; optionally flips a flag once it gets there.
pub struct SlowScheduler {
    option: String,
    score: f64,
    delay: Duration,
    finished: Option<Arc<AtomicBool>>,
}

impl SlowScheduler {
    pub fn new(option: &str, score: f64, delay: Duration) -> Self {
        Self {
            option: option.into(),
            score,
            delay,
            finished: None,
        }
    }

    pub fn with_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.finished = Some(flag);
        self
    }
}

#[async_trait]
impl Scheduler for SlowScheduler {
    fn name(&self) -> &str {
        "slow"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        tokio::time::sleep(self.delay).await;
        if let Some(flag) = &self.finished {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(Some(SchedulerResponse::new(&self.option, self.score)))
    }
}
