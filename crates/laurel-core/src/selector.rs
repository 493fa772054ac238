//! Weighted-random prompt selection for canary routing

use anyhow::Result;
use rand::Rng;
use tracing::{debug, warn};

use crate::models::PromptRecord;
use crate::storage::PromptStore;

/// Pick the prompt to serve a request, weighted by traffic allocation.
///
/// The RNG is caller-supplied so tests can seed it; this is the only
/// randomized operation in the crate.
pub async fn select_prompt<S, R>(store: &S, rng: &mut R) -> Result<Option<PromptRecord>>
where
    S: PromptStore + ?Sized,
    R: Rng + ?Sized,
{
    let active = store.get_active_prompt().await?;
    let candidate = store.get_candidate_prompt().await?;

    let (active, candidate) = match (active, candidate) {
        (None, None) => {
            warn!("No active or candidate prompt available");
            return Ok(None);
        }
        (Some(active), None) => {
            debug!(id = active.id, traffic = active.traffic, "Using active prompt");
            return Ok(Some(active));
        }
        (None, Some(candidate)) => {
            // Candidate without active should not happen in normal flow
            warn!(
                id = candidate.id,
                "Only a candidate prompt exists, using it"
            );
            return Ok(Some(candidate));
        }
        (Some(active), Some(candidate)) => (active, candidate),
    };

    let total = active.traffic + candidate.traffic;
    if total == 0.0 {
        warn!("Active and candidate both have zero traffic, defaulting to active");
        return Ok(Some(active));
    }

    let roll: f64 = rng.gen();
    let selected = if roll < active.traffic / total {
        debug!(id = active.id, roll, "Selected active prompt");
        active
    } else {
        debug!(id = candidate.id, roll, "Selected candidate prompt");
        candidate
    };

    Ok(Some(selected))
}
