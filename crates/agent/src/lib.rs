//! The scheduler-driven agent loop.
//!
//! Each session follows a **Prompt → LLM → Decide → Act → Observe** cycle:
//!
//! 1. **Receive** the user prompt
//! 2. **Send to LLM** via the configured provider
//! 3. **If tool calls**: broadcast a decision request to the schedulers,
//!    reduce their answers to one tool, execute it, append the results and
//!    loop back to step 2
//! 4. **If text response**: the session is done
//!
//! The loop also ends when a provider or tool fails, when the tool
//! execution limit is reached, or when the caller cancels the session.

pub mod loop_runner;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::AgentLoop;
pub use session::{LoopError, Session, SessionOutcome, SessionSummary};
