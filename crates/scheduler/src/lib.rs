//! Decision layer for loopevents.
//!
//! A decision round is three steps:
//!
//! 1. take a snapshot of the [`SchedulerRegistry`]
//! 2. [`DecisionBus::broadcast`] the request to every scheduler in it,
//!    bounded by the configured window
//! 3. [`reduce`] whatever came back into exactly one decision
//!
//! Failing, silent or confused schedulers degrade the round to fewer
//! voices, never to an error: with no valid voice at all the first
//! candidate is used.

pub mod bus;
pub mod catalog;
pub mod reducer;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bus::{BroadcastOutcome, CollectedResponse, DecisionBus};
pub use catalog::SchedulerCatalog;
pub use reducer::reduce;
pub use registry::SchedulerRegistry;
