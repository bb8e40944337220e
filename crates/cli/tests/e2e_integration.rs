//! End-to-end integration tests for the loopevents orchestrator.
//!
//! These tests exercise the full pipeline from user prompt to session
//! outcome: provider turns, decision broadcast and reduction, tool
//! execution, and configuration-driven wiring.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use loopevents_agent::{AgentLoop, LoopError};
use loopevents_config::{AppConfig, SchedulerSettings};
use loopevents_core::decision::{DecisionRequest, Provenance, SchedulerResponse};
use loopevents_core::error::{ProviderError, SchedulerError, ToolError};
use loopevents_core::event::{EventBus, LoopEvent};
use loopevents_core::message::{Message, MessageToolCall, Role};
use loopevents_core::provider::{Provider, ProviderRequest, ProviderResponse, ProviderRouter};
use loopevents_core::scheduler::{Scheduler, SchedulerRegistration};
use loopevents_core::state::LoopState;
use loopevents_core::tool::{Tool, ToolRegistry, ToolResult};
use loopevents_scheduler::{SchedulerCatalog, SchedulerRegistry};
use tokio_util::sync::CancellationToken;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Requests `tool_X` and `tool_Y` for `rounds` turns, then answers.
struct TwoToolProvider {
    rounds: usize,
    calls: AtomicUsize,
}

impl TwoToolProvider {
    fn new(rounds: usize) -> Self {
        Self {
            rounds,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for TwoToolProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.rounds {
            return Ok(response(Message::assistant("all done")));
        }
        let mut message = Message::assistant("");
        message.tool_calls = vec![
            call(&format!("x_{n}"), "tool_X"),
            call(&format!("y_{n}"), "tool_Y"),
        ];
        Ok(response(message))
    }
}

/// Asks for a tool on every turn, forever.
struct AlwaysToolProvider;

#[async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut message = Message::assistant("");
        message.tool_calls = vec![call("again", "tool_X")];
        Ok(response(message))
    }
}

fn response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: None,
        model: "mock".into(),
    }
}

fn call(id: &str, name: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: "{}".into(),
    }
}

// ── Mock Tools ───────────────────────────────────────────────────────────

struct NamedTool {
    name: &'static str,
    runs: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Tool for NamedTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "records that it ran"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.runs.lock().unwrap().push(self.name);
        Ok(ToolResult::success("", format!("{} ran", self.name)))
    }
}

fn tools() -> (Arc<ToolRegistry>, Arc<Mutex<Vec<&'static str>>>) {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    for name in ["tool_X", "tool_Y"] {
        registry.register(Box::new(NamedTool {
            name,
            runs: runs.clone(),
        }));
    }
    (Arc::new(registry), runs)
}

// ── Mock Schedulers ──────────────────────────────────────────────────────

struct Prefers {
    option: String,
    score: f64,
    asked: AtomicUsize,
}

impl Prefers {
    fn new(option: &str, score: f64) -> Self {
        Self {
            option: option.into(),
            score,
            asked: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Scheduler for Prefers {
    fn name(&self) -> &str {
        "prefers"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(Some(SchedulerResponse::new(&self.option, self.score)))
    }
}

struct Broken;

#[async_trait]
impl Scheduler for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        Err(SchedulerError::Failed {
            scheduler: "broken".into(),
            reason: "model offline".into(),
        })
    }
}

struct Silent;

#[async_trait]
impl Scheduler for Silent {
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

fn agent(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, schedulers: Vec<SchedulerRegistration>) -> AgentLoop {
    AgentLoop::new(
        provider,
        tools,
        Arc::new(SchedulerRegistry::with_registrations(schedulers)),
        Arc::new(EventBus::default()),
    )
    .with_broadcast_timeout(Duration::from_millis(100))
}

fn executed_tools(runs: &Mutex<Vec<&'static str>>) -> Vec<&'static str> {
    runs.lock().unwrap().clone()
}

// ── E2E: decisions ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_single_scheduler_picks_its_tool_every_round() {
    let provider = Arc::new(TwoToolProvider::new(3));
    let (tools, runs) = tools();
    let prefers = Arc::new(Prefers::new("tool_X", 1.0));
    let agent = agent(
        provider.clone(),
        tools,
        vec![SchedulerRegistration::new("x-lover", prefers.clone())],
    );

    let session = agent.run("do three things", &CancellationToken::new()).await;

    assert_eq!(session.state(), LoopState::Done);
    assert_eq!(session.final_response(), Some("all done"));
    assert_eq!(executed_tools(&runs), vec!["tool_X", "tool_X", "tool_X"]);
    assert_eq!(prefers.asked.load(Ordering::SeqCst), 3);
    assert_eq!(provider.calls(), 4);
    for decision in session.decisions() {
        assert_eq!(decision.option, "tool_X");
        assert_eq!(decision.provenance, Provenance::Scheduler { id: "x-lover".into() });
    }
}

#[tokio::test]
async fn e2e_failing_scheduler_never_changes_the_outcome() {
    let (tools_a, runs_a) = tools();
    let baseline = agent(
        Arc::new(TwoToolProvider::new(2)),
        tools_a,
        vec![SchedulerRegistration::new("y-lover", Arc::new(Prefers::new("tool_Y", 0.5)))],
    )
    .run("go", &CancellationToken::new())
    .await;

    let (tools_b, runs_b) = tools();
    let with_broken = agent(
        Arc::new(TwoToolProvider::new(2)),
        tools_b,
        vec![
            SchedulerRegistration::new("broken", Arc::new(Broken)),
            SchedulerRegistration::new("y-lover", Arc::new(Prefers::new("tool_Y", 0.5))),
        ],
    )
    .run("go", &CancellationToken::new())
    .await;

    assert_eq!(baseline.state(), LoopState::Done);
    assert_eq!(with_broken.state(), LoopState::Done);
    assert_eq!(executed_tools(&runs_a), executed_tools(&runs_b));
    assert_eq!(executed_tools(&runs_b), vec!["tool_Y", "tool_Y"]);
}

#[tokio::test]
async fn e2e_no_tool_calls_finishes_without_broadcast() {
    let provider = Arc::new(TwoToolProvider::new(0));
    let (tools, runs) = tools();
    let prefers = Arc::new(Prefers::new("tool_X", 1.0));
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    let agent = AgentLoop::new(
        provider,
        tools,
        Arc::new(SchedulerRegistry::with_registrations(vec![SchedulerRegistration::new(
            "x-lover",
            prefers.clone(),
        )])),
        events,
    );

    let session = agent.run("just talk", &CancellationToken::new()).await;

    assert_eq!(session.state(), LoopState::Done);
    assert_eq!(prefers.asked.load(Ordering::SeqCst), 0);
    assert!(executed_tools(&runs).is_empty());
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(*event, LoopEvent::DecisionRequested { .. }));
    }
}

#[tokio::test]
async fn e2e_iteration_limit_stops_after_exactly_n_tools() {
    let (tools, runs) = tools();
    let agent = agent(Arc::new(AlwaysToolProvider), tools, vec![]).with_max_iterations(4);

    let session = agent.run("never stop", &CancellationToken::new()).await;

    assert_eq!(session.state(), LoopState::Failed);
    assert!(matches!(session.error(), Some(LoopError::IterationLimitExceeded { limit: 4 })));
    assert_eq!(session.tool_executions(), 4);
    assert_eq!(executed_tools(&runs).len(), 4);
}

#[tokio::test]
async fn e2e_zero_schedulers_use_first_requested_tool() {
    let (tools, runs) = tools();
    let agent = agent(Arc::new(TwoToolProvider::new(1)), tools, vec![]);

    let session = agent.run("go", &CancellationToken::new()).await;

    assert_eq!(session.state(), LoopState::Done);
    assert_eq!(executed_tools(&runs), vec!["tool_X"]);
    let decision = &session.decisions()[0];
    assert!(decision.is_fallback());
    assert_eq!(decision.score, None);
}

#[tokio::test(start_paused = true)]
async fn e2e_silent_scheduler_degrades_to_fallback_after_timeout() {
    let (tools, runs) = tools();
    let agent = agent(
        Arc::new(TwoToolProvider::new(1)),
        tools,
        vec![SchedulerRegistration::new("silent", Arc::new(Silent))],
    );

    let started = tokio::time::Instant::now();
    let session = agent.run("go", &CancellationToken::new()).await;

    assert_eq!(session.state(), LoopState::Done);
    assert!(session.decisions()[0].is_fallback());
    assert_eq!(executed_tools(&runs), vec!["tool_X"]);
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn e2e_cancel_during_broadcast() {
    let (tools, runs) = tools();
    let agent = AgentLoop::new(
        Arc::new(TwoToolProvider::new(5)),
        tools,
        Arc::new(SchedulerRegistry::with_registrations(vec![SchedulerRegistration::new(
            "silent",
            Arc::new(Silent),
        )])),
        Arc::new(EventBus::default()),
    )
    .with_broadcast_timeout(Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let session = agent.run("go", &cancel).await;

    assert_eq!(session.state(), LoopState::Cancelled);
    assert!(executed_tools(&runs).is_empty());
    // The conversation survives cancellation.
    assert_eq!(session.conversation().roles(), vec![Role::User, Role::Assistant]);
}

// ── E2E: configuration wiring ────────────────────────────────────────────

#[tokio::test]
async fn e2e_agent_from_config() {
    let config = AppConfig::parse(
        r#"
[orchestrator]
max_iterations = 2
broadcast_timeout_ms = 100
default_provider = "mock"

[[schedulers]]
id = "prefer-y"
module = "prefers"
[schedulers.config]
option = "tool_Y"

[[schedulers]]
id = "disabled"
module = "prefers"
enabled = false
"#,
    )
    .unwrap();

    let mut catalog = SchedulerCatalog::new();
    catalog.register("prefers", |settings: &SchedulerSettings| {
        let option = settings
            .config
            .get("option")
            .and_then(|v| v.as_str())
            .unwrap_or("tool_X");
        Ok(Arc::new(Prefers::new(option, 1.0)) as Arc<dyn Scheduler>)
    });

    let mut router = ProviderRouter::new();
    router.register("other", Arc::new(AlwaysToolProvider));
    router.register("mock", Arc::new(TwoToolProvider::new(1)));

    let (tools, runs) = tools();
    let agent = AgentLoop::from_config(&config, router, &catalog, tools, Arc::new(EventBus::default())).unwrap();
    assert_eq!(agent.registry().ids().await, vec!["prefer-y"]);

    let session = agent.run("go", &CancellationToken::new()).await;
    assert_eq!(session.state(), LoopState::Done);
    assert_eq!(executed_tools(&runs), vec!["tool_Y"]);
}

#[tokio::test]
async fn e2e_unknown_scheduler_module_is_a_setup_error() {
    let config = AppConfig::parse(
        r#"
[[schedulers]]
id = "mystery"
module = "does-not-exist"
"#,
    )
    .unwrap();

    let mut router = ProviderRouter::new();
    router.register("mock", Arc::new(AlwaysToolProvider));
    let (tools, _) = tools();

    let result = AgentLoop::from_config(
        &config,
        router,
        &SchedulerCatalog::new(),
        tools,
        Arc::new(EventBus::default()),
    );
    assert!(matches!(
        result,
        Err(loopevents_core::Error::Scheduler(SchedulerError::UnknownModule(_)))
    ));
}
