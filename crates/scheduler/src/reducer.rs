//! Decision reducer: fold a round's responses into one decision.
//!
//! Rules, in order:
//! 1. Responses naming an option outside the candidate set, or carrying no
//!    usable score, are excluded.
//! 2. The highest score wins; equal scores go to the earliest-registered
//!    scheduler. Arrival order never matters.
//! 3. With nothing left, the first candidate is chosen as the fallback.

use loopevents_core::decision::{Decision, DecisionRequest, Provenance};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::bus::CollectedResponse;

/// Reduce `responses` to exactly one decision. Never fails.
pub fn reduce(request: &DecisionRequest, responses: &[CollectedResponse]) -> Decision {
    let mut excluded = Vec::new();
    let mut best: Option<(&CollectedResponse, f64)> = None;

    for collected in responses {
        let response = &collected.response;

        if !request.is_candidate(&response.option) {
            warn!(
                request_id = %request.id(),
                scheduler = %collected.scheduler_id,
                option = %response.option,
                "Scheduler chose an option outside the candidate set, excluding response"
            );
            excluded.push(collected.scheduler_id.clone());
            continue;
        }

        let Some(score) = response.usable_score() else {
            warn!(
                request_id = %request.id(),
                scheduler = %collected.scheduler_id,
                score = ?response.score,
                "Scheduler response has no usable score, excluding response"
            );
            excluded.push(collected.scheduler_id.clone());
            continue;
        };

        best = match best {
            Some((current, current_score)) if !outranks(score, collected.rank, current_score, current.rank) => {
                Some((current, current_score))
            }
            _ => Some((collected, score)),
        };
    }

    match best {
        Some((winner, score)) => {
            debug!(
                request_id = %request.id(),
                scheduler = %winner.scheduler_id,
                option = %winner.response.option,
                score,
                "Decision reduced"
            );
            Decision {
                option: winner.response.option.clone(),
                score: Some(score),
                provenance: Provenance::Scheduler {
                    id: winner.scheduler_id.clone(),
                },
                rationale: winner.response.rationale.clone(),
                excluded,
            }
        }
        None => {
            debug!(
                request_id = %request.id(),
                option = %request.fallback_option(),
                "No valid scheduler response, using fallback"
            );
            Decision {
                option: request.fallback_option().to_string(),
                score: None,
                provenance: Provenance::Fallback,
                rationale: None,
                excluded,
            }
        }
    }
}

/// Whether (score, rank) beats the current best.
fn outranks(score: f64, rank: usize, best_score: f64, best_rank: usize) -> bool {
    match score.total_cmp(&best_score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => rank < best_rank,
    }
}
