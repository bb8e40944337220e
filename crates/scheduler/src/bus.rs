//! Decision bus: fan a request out to every scheduler, fan answers back in.
//!
//! Each listener runs in its own task of a [`JoinSet`]. The broadcast ends
//! when every task has finished, the shared deadline passes, or the session
//! is cancelled. Unfinished tasks are aborted when the set is dropped, so a
//! straggler's answer can never reach the caller after the window closes.

use futures::FutureExt;
use loopevents_core::decision::{DecisionRequest, SchedulerResponse};
use loopevents_core::error::SchedulerError;
use loopevents_core::scheduler::SchedulerRegistration;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A response tagged with who sent it.
#[derive(Debug, Clone)]
pub struct CollectedResponse {
    /// Id of the responding scheduler
    pub scheduler_id: String,

    /// Position of the scheduler in the registry snapshot (0 = earliest)
    pub rank: usize,

    pub response: SchedulerResponse,
}

/// Everything one broadcast observed.
#[derive(Debug, Default)]
pub struct BroadcastOutcome {
    /// Responses received inside the window, in arrival order
    pub responses: Vec<CollectedResponse>,

    /// Schedulers that explicitly declined
    pub abstained: Vec<String>,

    /// Schedulers that errored or panicked
    pub failed: Vec<(String, SchedulerError)>,

    /// Schedulers still running when the window closed
    pub timed_out: Vec<String>,

    /// The session was cancelled mid-broadcast
    pub cancelled: bool,

    pub elapsed: Duration,
}

enum ListenerReply {
    Responded(SchedulerResponse),
    Abstained,
    Failed(SchedulerError),
}

/// Stateless broadcaster with a fixed response window.
#[derive(Debug, Clone)]
pub struct DecisionBus {
    timeout: Duration,
}

impl DecisionBus {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Dispatch `request` to every listener concurrently and collect what
    /// arrives before the window closes.
    pub async fn broadcast(
        &self,
        request: Arc<DecisionRequest>,
        listeners: &[SchedulerRegistration],
        cancel: &CancellationToken,
    ) -> BroadcastOutcome {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut outcome = BroadcastOutcome::default();
        let mut answered = vec![false; listeners.len()];

        let mut tasks = JoinSet::new();
        for (rank, registration) in listeners.iter().enumerate() {
            let scheduler = registration.scheduler.clone();
            let request = request.clone();
            let id = registration.id.clone();
            tasks.spawn(async move {
                let reply = AssertUnwindSafe(scheduler.on_decision_request(&request))
                    .catch_unwind()
                    .await;
                let reply = match reply {
                    Ok(Ok(Some(response))) => ListenerReply::Responded(response),
                    Ok(Ok(None)) => ListenerReply::Abstained,
                    Ok(Err(e)) => ListenerReply::Failed(e),
                    Err(_) => ListenerReply::Failed(SchedulerError::Panicked { scheduler: id.clone() }),
                };
                (rank, id, reply)
            });
        }

        debug!(
            request_id = %request.id(),
            kind = %request.kind(),
            listeners = listeners.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Broadcasting decision request"
        );

        let window = tokio::time::sleep_until(deadline);
        tokio::pin!(window);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(request_id = %request.id(), "Broadcast cancelled");
                    outcome.cancelled = true;
                    break;
                }

                _ = &mut window => {
                    break;
                }

                joined = tasks.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    let (rank, id, reply) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            // Panics are caught inside the task; only aborts land here.
                            warn!(error = %e, "Scheduler task ended abnormally");
                            continue;
                        }
                    };
                    answered[rank] = true;
                    match reply {
                        ListenerReply::Responded(response) => {
                            debug!(scheduler = %id, option = %response.option, score = ?response.score, "Scheduler responded");
                            outcome.responses.push(CollectedResponse {
                                scheduler_id: id,
                                rank,
                                response,
                            });
                        }
                        ListenerReply::Abstained => {
                            debug!(scheduler = %id, "Scheduler abstained");
                            outcome.abstained.push(id);
                        }
                        ListenerReply::Failed(e) => {
                            warn!(scheduler = %id, error = %e, "Scheduler failed, treating as abstention");
                            outcome.failed.push((id, e));
                        }
                    }
                }
            }
        }

        // Stragglers are aborted here; anything they produce is discarded.
        tasks.abort_all();
        drop(tasks);

        if !outcome.cancelled {
            for (rank, registration) in listeners.iter().enumerate() {
                if !answered[rank] {
                    warn!(
                        scheduler = %registration.id,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Scheduler did not answer in time, treating as abstention"
                    );
                    outcome.timed_out.push(registration.id.clone());
                }
            }
        }

        outcome.elapsed = started.elapsed();
        outcome
    }
}
