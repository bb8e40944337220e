//! Error types for the loopevents domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator (provider, tool adapter, scheduler) has its own enum so
//! the loop can tell an adapter failure from a listener failure.

use thiserror::Error;

/// The top-level error type for loopevents operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Scheduler errors ---
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    // --- Decision errors ---
    #[error("Decision request for {kind} has no candidate options")]
    EmptyCandidates { kind: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// A failure raised by one scheduler while handling a decision request.
///
/// Never fatal: the bus records it and treats the scheduler as abstaining.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("Scheduler {scheduler} failed: {reason}")]
    Failed { scheduler: String, reason: String },

    #[error("Scheduler {scheduler} panicked")]
    Panicked { scheduler: String },

    #[error("Scheduler {scheduler} is misconfigured: {reason}")]
    Misconfigured { scheduler: String, reason: String },

    #[error("Unknown scheduler module: {0}")]
    UnknownModule(String),
}
