//! Shared test helpers for loop tests.

use async_trait::async_trait;
use loopevents_core::decision::{DecisionRequest, SchedulerResponse};
use loopevents_core::error::{ProviderError, SchedulerError, ToolError};
use loopevents_core::message::{Message, MessageToolCall};
use loopevents_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
use loopevents_core::scheduler::Scheduler;
use loopevents_core::tool::{ToolCall, ToolExecutor, ToolResult};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A mock provider that returns a sequence of scripted responses.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "ScriptedProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let response = responses[*count].clone();
        *count += 1;
        Ok(response)
    }
}

/// Requests the same tool on every call.
pub struct EndlessToolProvider {
    tool: String,
    calls: AtomicUsize,
}

impl EndlessToolProvider {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.into(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Provider for EndlessToolProvider {
    fn name(&self) -> &str {
        "endless_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(tool_response(vec![tool_call(
            &format!("call_{n}"),
            &self.tool,
            serde_json::json!({}),
        )]))
    }
}

/// Always fails with a network error.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

/// Create a simple text response (no tool calls).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response requesting `tool_calls`.
pub fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = tool_calls;
    ProviderResponse {
        message,
        usage: None,
        model: "mock-model".into(),
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

/// Tool executor that records what it ran.
///
/// Unknown names yield `ToolError::NotFound`; names marked with
/// [`RecordingTools::failing`] yield `ToolError::ExecutionFailed`.
pub struct RecordingTools {
    names: Vec<String>,
    failing: Vec<String>,
    executed: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingTools {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            failing: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.into());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn last_arguments(&self) -> Option<serde_json::Value> {
        self.executed.lock().unwrap().last().map(|(_, a)| a.clone())
    }
}

#[async_trait]
impl ToolExecutor for RecordingTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.names
            .iter()
            .map(|name| ToolDefinition {
                name: name.clone(),
                description: format!("mock {name}"),
                parameters: serde_json::json!({"type": "object"}),
            })
            .collect()
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        if !self.names.contains(&call.name) {
            return Err(ToolError::NotFound(call.name.clone()));
        }
        if self.failing.contains(&call.name) {
            return Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: "boom".into(),
            });
        }
        self.executed
            .lock()
            .unwrap()
            .push((call.name.clone(), call.arguments.clone()));
        Ok(ToolResult::success(&call.id, format!("{} ok", call.name)))
    }
}

/// Tool executor whose calls never complete.
pub struct HangingTools {
    names: Vec<String>,
}

impl HangingTools {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ToolExecutor for HangingTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.names
            .iter()
            .map(|name| ToolDefinition {
                name: name.clone(),
                description: format!("hangs {name}"),
                parameters: serde_json::json!({"type": "object"}),
            })
            .collect()
    }

    async fn execute(&self, _call: &ToolCall) -> Result<ToolResult, ToolError> {
        std::future::pending().await
    }
}

/// Always picks the same option with the same score.
pub struct FixedScheduler {
    option: String,
    score: f64,
}

impl FixedScheduler {
    pub fn new(option: &str, score: f64) -> Self {
        Self {
            option: option.into(),
            score,
        }
    }
}

#[async_trait]
impl Scheduler for FixedScheduler {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        Ok(Some(SchedulerResponse::new(&self.option, self.score)))
    }
}

/// Abstains, counting how often it was asked.
#[derive(Default)]
pub struct CountingScheduler {
    calls: AtomicUsize,
}

impl CountingScheduler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scheduler for CountingScheduler {
    fn name(&self) -> &str {
        "counting"
    }

    async fn on_decision_request(
        &self,
        _request: &DecisionRequest,
    ) -> Result<Option<SchedulerResponse>, SchedulerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}
