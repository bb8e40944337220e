//! The agent loop controller.

use chrono::Utc;
use loopevents_config::{AppConfig, OrchestratorConfig};
use loopevents_core::decision::{Decision, DecisionKind, DecisionRequest};
use loopevents_core::error::ToolError;
use loopevents_core::event::{ErrorEvent, EventBus, LoopEvent, Severity};
use loopevents_core::message::{Message, MessageToolCall};
use loopevents_core::provider::{Provider, ProviderRequest, ProviderRouter};
use loopevents_core::state::LoopState;
use loopevents_core::tool::{ToolCall, ToolExecutor, ToolResult};
use loopevents_scheduler::{DecisionBus, SchedulerCatalog, SchedulerRegistry, reduce};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::session::{LoopError, Session, SessionOutcome};

/// Drives sessions through prompt → LLM → decision → tool → LLM → ...
///
/// One `AgentLoop` can run many sessions concurrently; the only state they
/// share is the read-mostly scheduler registry.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tool execution adapter
    tools: Arc<dyn ToolExecutor>,

    /// Schedulers consulted every decision round
    registry: Arc<SchedulerRegistry>,

    /// Broadcaster with the configured response window
    bus: DecisionBus,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Maximum tool executions per session; `None` = unbounded
    max_iterations: Option<u32>,

    /// Optional system turn placed before the prompt
    system_prompt: Option<String>,

    /// Lifecycle events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with the default orchestrator settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        registry: Arc<SchedulerRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            provider,
            tools,
            registry,
            bus: DecisionBus::new(defaults.broadcast_timeout()),
            model: defaults.model,
            temperature: defaults.temperature,
            max_tokens: Some(defaults.max_tokens),
            max_iterations: Some(defaults.max_iterations),
            system_prompt: None,
            event_bus,
        }
    }

    /// Build a loop from configuration.
    ///
    /// The provider is picked from `router` (configured default first, then
    /// the first registered), and the registry is built from the configured
    /// scheduler list through `catalog`.
    pub fn from_config(
        config: &AppConfig,
        router: ProviderRouter,
        catalog: &SchedulerCatalog,
        tools: Arc<dyn ToolExecutor>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, loopevents_core::Error> {
        let o = &config.orchestrator;
        let provider = router.with_default(&o.default_provider).select()?;
        let registry = SchedulerRegistry::from_settings(&config.schedulers, catalog)?;

        info!(
            provider = %provider.name(),
            model = %o.model,
            broadcast_timeout_ms = o.broadcast_timeout_ms,
            max_iterations = o.max_iterations,
            "Agent loop configured"
        );

        Ok(Self::new(provider, tools, Arc::new(registry), event_bus)
            .with_model(&o.model)
            .with_temperature(o.temperature)
            .with_max_tokens(o.max_tokens)
            .with_broadcast_timeout(o.broadcast_timeout())
            .with_max_iterations(o.max_iterations))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set how long each decision broadcast waits for schedulers.
    pub fn with_broadcast_timeout(mut self, timeout: Duration) -> Self {
        self.bus = DecisionBus::new(timeout);
        self
    }

    /// Set the maximum number of tool executions per session.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Remove the tool execution limit.
    pub fn without_iteration_limit(mut self) -> Self {
        self.max_iterations = None;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn registry(&self) -> &Arc<SchedulerRegistry> {
        &self.registry
    }

    /// Run a fresh session for `prompt` until it reaches a terminal state.
    pub async fn run(&self, prompt: impl Into<String>, cancel: &CancellationToken) -> Session {
        let mut session = Session::new();
        self.run_session(&mut session, prompt.into(), cancel).await;
        session
    }

    /// Run `session`, which must still be awaiting its prompt.
    pub async fn run_session(&self, session: &mut Session, prompt: String, cancel: &CancellationToken) {
        if session.state() != LoopState::AwaitingPrompt {
            warn!(session_id = %session.id(), state = %session.state(), "Session already started, ignoring prompt");
            return;
        }

        info!(session_id = %session.id(), "Session started");
        self.event_bus.publish(LoopEvent::SessionStarted {
            session_id: session.id().to_string(),
            prompt_preview: prompt.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        if let Some(system_prompt) = &self.system_prompt {
            session.push(Message::system(system_prompt));
        }
        session.push(Message::user(prompt));
        session.transition(LoopState::AwaitingLlm);

        let outcome = self.iterate(session, cancel).await;
        match &outcome {
            SessionOutcome::Completed { .. } => {
                info!(session_id = %session.id(), tool_executions = session.tool_executions(), "Session done")
            }
            SessionOutcome::Failed(e) => {
                error!(session_id = %session.id(), error = %e, "Session failed")
            }
            SessionOutcome::Cancelled => info!(session_id = %session.id(), "Session cancelled"),
        }
        session.finish(outcome);

        self.event_bus.publish(LoopEvent::SessionEnded {
            session_id: session.id().to_string(),
            state: session.state(),
            tool_executions: session.tool_executions(),
            timestamp: Utc::now(),
        });
    }

    /// The loop body. Returns the terminal outcome; the caller records it.
    async fn iterate(&self, session: &mut Session, cancel: &CancellationToken) -> SessionOutcome {
        let tool_definitions = self.tools.definitions();

        loop {
            debug!(
                session_id = %session.id(),
                iteration = session.tool_executions(),
                turns = session.conversation().len(),
                "Requesting next assistant turn"
            );

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: session.conversation().messages().to_vec(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionOutcome::Cancelled,
                response = self.provider.complete(request) => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    self.publish_error(session, ErrorEvent::new("provider_failed", e.to_string(), Severity::High));
                    return SessionOutcome::Failed(LoopError::Provider(e));
                }
            };

            let message = response.message;
            if !message.has_tool_calls() {
                let text = message.content.clone();
                session.push(message);
                return SessionOutcome::Completed { response: text };
            }

            let tool_calls = message.tool_calls.clone();
            session.push(message);
            session.transition(LoopState::AwaitingDecision);

            if let Some(limit) = self.max_iterations {
                if session.tool_executions() >= limit {
                    warn!(session_id = %session.id(), limit, "Tool execution limit reached");
                    self.publish_error(
                        session,
                        ErrorEvent::new("iteration_limit", format!("limit of {limit} tool executions reached"), Severity::High),
                    );
                    return SessionOutcome::Failed(LoopError::IterationLimitExceeded { limit });
                }
            }

            let decision = match self.decide(session, &tool_calls, cancel).await {
                Ok(decision) => decision,
                Err(outcome) => return outcome,
            };
            let option = decision.option.clone();
            session.record_decision(decision);
            session.transition(LoopState::ExecutingTool);

            // The option is a candidate, so a call with that name exists.
            let Some(chosen) = tool_calls.iter().find(|c| c.name == option) else {
                return SessionOutcome::Failed(LoopError::Decision(format!(
                    "decision chose '{option}' which no tool call requested"
                )));
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionOutcome::Cancelled,
                result = self.execute(session, chosen) => result,
            };
            let result = match result {
                Ok(result) => result,
                Err(e) => return SessionOutcome::Failed(LoopError::Tool(e)),
            };
            session.count_tool_execution();

            // Every requested call gets a result turn, in request order.
            for call in &tool_calls {
                if call.id == chosen.id {
                    session.push(Message::tool_result(&call.id, &call.name, result.to_content()));
                } else {
                    session.push(Message::tool_result(
                        &call.id,
                        &call.name,
                        format!("Skipped: scheduler selected {option}"),
                    ));
                }
            }

            session.transition(LoopState::AwaitingLlm);
        }
    }

    /// One decision round over the tools the LLM asked for.
    ///
    /// `Err` carries the outcome that ends the session early.
    async fn decide(
        &self,
        session: &Session,
        tool_calls: &[MessageToolCall],
        cancel: &CancellationToken,
    ) -> Result<Decision, SessionOutcome> {
        let request = DecisionRequest::new(
            DecisionKind::ToolResolution,
            session.id().clone(),
            tool_calls.iter().map(|c| c.name.clone()),
            Arc::new(session.conversation().clone()),
        )
        .map_err(|e| SessionOutcome::Failed(LoopError::Decision(e.to_string())))?
        .with_metadata("available_tools", serde_json::json!(self.tools.available_tools()))
        .with_metadata("tool_calls", serde_json::to_value(tool_calls).unwrap_or_default());
        let request = Arc::new(request);

        let listeners = self.registry.snapshot().await;
        self.event_bus.publish(LoopEvent::DecisionRequested {
            session_id: session.id().to_string(),
            request_id: request.id().to_string(),
            kind: request.kind(),
            candidates: request.candidates().to_vec(),
            listeners: listeners.len(),
            timestamp: Utc::now(),
        });

        let outcome = self.bus.broadcast(request.clone(), &listeners, cancel).await;
        if outcome.cancelled {
            return Err(SessionOutcome::Cancelled);
        }

        for (scheduler, e) in &outcome.failed {
            let mut event = ErrorEvent::new("scheduler_failed", e.to_string(), Severity::Low).with_fallback("abstain");
            event.metadata.insert("scheduler".into(), serde_json::json!(scheduler));
            self.publish_error(session, event);
        }
        for scheduler in &outcome.timed_out {
            let mut event = ErrorEvent::new(
                "scheduler_timeout",
                format!("no answer within {}ms", self.bus.timeout().as_millis()),
                Severity::Low,
            )
            .with_fallback("abstain");
            event.metadata.insert("scheduler".into(), serde_json::json!(scheduler));
            self.publish_error(session, event);
        }

        let decision = reduce(&request, &outcome.responses);
        if !decision.excluded.is_empty() {
            let mut event = ErrorEvent::new(
                "invalid_response",
                format!("{} scheduler response(s) excluded", decision.excluded.len()),
                Severity::Medium,
            );
            event.metadata.insert("schedulers".into(), serde_json::json!(decision.excluded));
            self.publish_error(session, event);
        }

        info!(
            session_id = %session.id(),
            request_id = %request.id(),
            option = %decision.option,
            provenance = %decision.provenance,
            responses = outcome.responses.len(),
            "Tool selected"
        );
        self.event_bus.publish(LoopEvent::DecisionMade {
            session_id: session.id().to_string(),
            request_id: request.id().to_string(),
            option: decision.option.clone(),
            provenance: decision.provenance.clone(),
            score: decision.score,
            responses: outcome.responses.len(),
            timestamp: Utc::now(),
        });

        Ok(decision)
    }

    /// Run the chosen call through the tool adapter.
    ///
    /// The adapter reports an unknown tool as a failed result; any error it
    /// returns fails the session.
    async fn execute(&self, session: &Session, chosen: &MessageToolCall) -> Result<ToolResult, ToolError> {
        let call = ToolCall {
            id: chosen.id.clone(),
            name: chosen.name.clone(),
            arguments: serde_json::from_str(&chosen.arguments).unwrap_or_default(),
        };

        let start = std::time::Instant::now();
        let result = self.tools.dispatch(&call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Err(e) = &result {
            warn!(tool = %call.name, error = %e, "Tool execution failed");
            self.publish_error(session, ErrorEvent::new("tool_failed", e.to_string(), Severity::High));
        }

        self.event_bus.publish(LoopEvent::ToolExecuted {
            session_id: session.id().to_string(),
            tool_name: call.name.clone(),
            success: matches!(&result, Ok(r) if r.success),
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    fn publish_error(&self, session: &Session, error: ErrorEvent) {
        self.event_bus.publish(LoopEvent::ErrorOccurred {
            session_id: session.id().to_string(),
            error,
            timestamp: Utc::now(),
        });
    }
}
