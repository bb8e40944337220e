//! # loopevents Core
//!
//! Domain types, traits, and error definitions for the loopevents
//! orchestrator. This crate has **no runtime machinery** of its own: it
//! defines the vocabulary that the scheduler, agent and CLI crates share.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`] produces the next assistant turn
//! - [`ToolExecutor`] runs the tool a decision selected
//! - [`Scheduler`] scores candidate options for a [`DecisionRequest`]
//!
//! Implementations live outside this crate, so tests swap in scripted
//! stand-ins and embedders wire in real backends.

pub mod decision;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod scheduler;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use decision::{Decision, DecisionKind, DecisionRequest, Provenance, SchedulerResponse};
pub use error::{Error, Result};
pub use event::{ErrorEvent, EventBus, LoopEvent, Severity};
pub use message::{Conversation, Message, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ProviderRouter};
pub use scheduler::{Scheduler, SchedulerRegistration};
pub use state::LoopState;
pub use tool::{Tool, ToolCall, ToolExecutor, ToolRegistry, ToolResult};
