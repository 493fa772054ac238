//! Canary traffic controller
//!
//! Shifts traffic between the active prompt and a candidate in fixed
//! steps based on observed feedback, and settles the experiment once
//! either prompt owns all traffic. One call handles one tick; the
//! scheduling cadence lives with the caller.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::models::{PromptRecord, PromptStatus};
use crate::storage::PromptStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOutcome {
    ActiveWins,
    CandidateWins,
    Tie,
}

#[derive(Clone, Debug)]
pub struct CanaryConfig {
    /// Traffic moved per winning tick
    pub traffic_step: f64,
    /// Candidate interactions required before a comparison counts
    pub min_candidate_interactions: i64,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            traffic_step: 0.1,
            min_candidate_interactions: 10,
        }
    }
}

/// Decide which prompt the observed feedback favors.
///
/// Insufficient candidate evidence or a missing average on either side
/// is a tie; only a strictly greater score wins.
pub fn compare_metrics(
    active: &PromptRecord,
    candidate: &PromptRecord,
    config: &CanaryConfig,
) -> CompareOutcome {
    if candidate.num_interactions < config.min_candidate_interactions {
        debug!(
            candidate_interactions = candidate.num_interactions,
            required = config.min_candidate_interactions,
            "Not enough candidate evidence yet"
        );
        return CompareOutcome::Tie;
    }

    match (active.average_feedback_score, candidate.average_feedback_score) {
        (Some(active_score), Some(candidate_score)) => {
            if candidate_score > active_score {
                CompareOutcome::CandidateWins
            } else if active_score > candidate_score {
                CompareOutcome::ActiveWins
            } else {
                CompareOutcome::Tie
            }
        }
        _ => CompareOutcome::Tie,
    }
}

/// New (active, candidate) traffic after one step toward the winner.
///
/// Clamped to [0, 1]; a step that overshoots lands exactly on the
/// terminal 1.0/0.0 pair the stabilization check compares against.
fn step_traffic(
    active_traffic: f64,
    candidate_traffic: f64,
    outcome: CompareOutcome,
    step: f64,
) -> (f64, f64) {
    match outcome {
        CompareOutcome::CandidateWins => (
            (active_traffic - step).max(0.0),
            (candidate_traffic + step).min(1.0),
        ),
        CompareOutcome::ActiveWins => (
            (active_traffic + step).min(1.0),
            (candidate_traffic - step).max(0.0),
        ),
        CompareOutcome::Tie => (active_traffic, candidate_traffic),
    }
}

/// Apply terminal status changes once one side owns all traffic.
async fn check_stabilization<S: PromptStore + ?Sized>(
    store: &S,
    active: &PromptRecord,
    candidate: &PromptRecord,
    active_traffic: f64,
    candidate_traffic: f64,
) -> Result<()> {
    if active_traffic == 1.0 && candidate_traffic == 0.0 {
        info!(
            candidate_id = candidate.id,
            "Candidate lost the experiment, rolling back"
        );
        store
            .update_prompt_status(candidate.id, PromptStatus::RolledBack)
            .await?;
    } else if candidate_traffic == 1.0 && active_traffic == 0.0 {
        info!(
            candidate_id = candidate.id,
            former_active_id = active.id,
            "Candidate won the experiment, promoting"
        );
        // Deprecate first so the unique active slot is free
        store
            .update_prompt_status(active.id, PromptStatus::Deprecated)
            .await?;
        store
            .update_prompt_status(candidate.id, PromptStatus::Active)
            .await?;
    }
    Ok(())
}

/// Run a single controller tick against the given store.
///
/// No candidate means the system is stable and the tick is a no-op. A
/// candidate without an active prompt is an invalid state: it is logged
/// and skipped rather than guessed at, so a scheduled job never crashes
/// on it.
pub async fn canary_tick<S: PromptStore + ?Sized>(store: &S, config: &CanaryConfig) -> Result<()> {
    let candidate = match store.get_candidate_prompt().await? {
        Some(candidate) => candidate,
        None => {
            debug!("No candidate prompt, system is stable");
            return Ok(());
        }
    };

    let active = match store.get_active_prompt().await? {
        Some(active) => active,
        None => {
            error!(
                candidate_id = candidate.id,
                "Candidate exists without an active prompt, skipping tick"
            );
            return Ok(());
        }
    };

    let outcome = compare_metrics(&active, &candidate, config);
    let (active_traffic, candidate_traffic) =
        step_traffic(active.traffic, candidate.traffic, outcome, config.traffic_step);

    if outcome != CompareOutcome::Tie {
        info!(
            ?outcome,
            active_traffic, candidate_traffic, "Adjusting canary traffic"
        );
        store.update_prompt_traffic(active.id, active_traffic).await?;
        store
            .update_prompt_traffic(candidate.id, candidate_traffic)
            .await?;
    } else {
        debug!("Comparison tied, traffic unchanged");
    }

    check_stabilization(store, &active, &candidate, active_traffic, candidate_traffic).await
}

/// Scheduled entry point: opens its own database connection, runs one
/// tick, and releases the connection whatever happens.
pub async fn run_canary_tick(database_url: &str, config: &CanaryConfig) -> Result<()> {
    let store = crate::db::PgStore::connect(database_url)?;
    canary_tick(&store, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn record(id: i32, traffic: f64, count: i64, avg: Option<f64>) -> PromptRecord {
        PromptRecord {
            id,
            prompt_text: format!("prompt {}", id),
            status: if id == 1 {
                PromptStatus::Active
            } else {
                PromptStatus::Candidate
            },
            traffic,
            num_interactions: count,
            average_feedback_score: avg,
        }
    }

    async fn seed(store: &MemoryStore, active_traffic: f64, candidate_traffic: f64) -> (i32, i32) {
        let active = store
            .insert_prompt("active", PromptStatus::Active, active_traffic)
            .await
            .unwrap();
        let candidate = store
            .insert_prompt("candidate", PromptStatus::Candidate, candidate_traffic)
            .await
            .unwrap();
        (active, candidate)
    }

    async fn feed(store: &MemoryStore, id: i32, score: f64, times: i64) {
        for _ in 0..times {
            store.update_prompt_metrics(id, Some(score)).await.unwrap();
        }
    }

    #[test]
    fn test_compare_needs_candidate_evidence() {
        let config = CanaryConfig::default();
        let active = record(1, 0.9, 100, Some(0.5));
        let candidate = record(2, 0.1, 9, Some(0.9));
        assert_eq!(
            compare_metrics(&active, &candidate, &config),
            CompareOutcome::Tie
        );
    }

    #[test]
    fn test_compare_missing_average_is_tie() {
        let config = CanaryConfig::default();
        let candidate = record(2, 0.1, 50, Some(0.9));
        assert_eq!(
            compare_metrics(&record(1, 0.9, 100, None), &candidate, &config),
            CompareOutcome::Tie
        );
        assert_eq!(
            compare_metrics(
                &record(1, 0.9, 100, Some(0.5)),
                &record(2, 0.1, 50, None),
                &config
            ),
            CompareOutcome::Tie
        );
    }

    #[test]
    fn test_compare_strictly_greater_wins() {
        let config = CanaryConfig::default();
        assert_eq!(
            compare_metrics(
                &record(1, 0.9, 100, Some(0.5)),
                &record(2, 0.1, 50, Some(0.7)),
                &config
            ),
            CompareOutcome::CandidateWins
        );
        assert_eq!(
            compare_metrics(
                &record(1, 0.9, 100, Some(0.7)),
                &record(2, 0.1, 50, Some(0.5)),
                &config
            ),
            CompareOutcome::ActiveWins
        );
        assert_eq!(
            compare_metrics(
                &record(1, 0.9, 100, Some(0.6)),
                &record(2, 0.1, 50, Some(0.6)),
                &config
            ),
            CompareOutcome::Tie
        );
    }

    #[test]
    fn test_step_clamps_to_unit_interval() {
        assert_eq!(
            step_traffic(0.05, 0.95, CompareOutcome::CandidateWins, 0.1),
            (0.0, 1.0)
        );
        assert_eq!(
            step_traffic(0.95, 0.05, CompareOutcome::ActiveWins, 0.1),
            (1.0, 0.0)
        );
        assert_eq!(step_traffic(0.5, 0.5, CompareOutcome::Tie, 0.1), (0.5, 0.5));
    }

    #[tokio::test]
    async fn test_tick_without_candidate_is_noop() {
        let store = MemoryStore::new();
        store
            .insert_prompt("active", PromptStatus::Active, 1.0)
            .await
            .unwrap();
        canary_tick(&store, &CanaryConfig::default()).await.unwrap();
        let active = store.get_active_prompt().await.unwrap().unwrap();
        assert_eq!(active.traffic, 1.0);
    }

    #[tokio::test]
    async fn test_tick_candidate_without_active_does_not_fail() {
        let store = MemoryStore::new();
        store
            .insert_prompt("candidate", PromptStatus::Candidate, 0.1)
            .await
            .unwrap();
        canary_tick(&store, &CanaryConfig::default()).await.unwrap();
        let candidate = store.get_candidate_prompt().await.unwrap().unwrap();
        assert_eq!(candidate.traffic, 0.1);
    }

    #[tokio::test]
    async fn test_tick_moves_traffic_toward_winner() {
        let store = MemoryStore::new();
        let (active_id, candidate_id) = seed(&store, 0.9, 0.1).await;
        feed(&store, active_id, 0.5, 20).await;
        feed(&store, candidate_id, 0.9, 20).await;

        canary_tick(&store, &CanaryConfig::default()).await.unwrap();

        let active = store.get_prompt(active_id).unwrap();
        let candidate = store.get_prompt(candidate_id).unwrap();
        assert!((active.traffic - 0.8).abs() < 1e-9);
        assert!((candidate.traffic - 0.2).abs() < 1e-9);
        assert_eq!(candidate.status, PromptStatus::Candidate);
    }

    #[tokio::test]
    async fn test_candidate_promotion_end_to_end() {
        let store = MemoryStore::new();
        let (active_id, candidate_id) = seed(&store, 0.2, 0.8).await;
        feed(&store, active_id, 0.4, 20).await;
        feed(&store, candidate_id, 0.9, 20).await;

        // Two winning ticks take the candidate from 0.8 to exactly 1.0
        let config = CanaryConfig::default();
        for _ in 0..2 {
            canary_tick(&store, &config).await.unwrap();
        }

        let former_active = store.get_prompt(active_id).unwrap();
        let promoted = store.get_prompt(candidate_id).unwrap();
        assert_eq!(former_active.status, PromptStatus::Deprecated);
        assert_eq!(former_active.traffic, 0.0);
        assert_eq!(promoted.status, PromptStatus::Active);
        assert_eq!(promoted.traffic, 1.0);

        // Next tick sees no candidate and leaves everything alone
        canary_tick(&store, &config).await.unwrap();
        assert_eq!(store.get_prompt(candidate_id).unwrap().traffic, 1.0);
    }

    #[tokio::test]
    async fn test_candidate_rollback_end_to_end() {
        let store = MemoryStore::new();
        let (active_id, candidate_id) = seed(&store, 0.9, 0.1).await;
        feed(&store, active_id, 0.9, 20).await;
        feed(&store, candidate_id, 0.3, 20).await;

        let config = CanaryConfig::default();
        canary_tick(&store, &config).await.unwrap();

        let active = store.get_prompt(active_id).unwrap();
        let rolled_back = store.get_prompt(candidate_id).unwrap();
        assert_eq!(active.status, PromptStatus::Active);
        assert_eq!(active.traffic, 1.0);
        assert_eq!(rolled_back.status, PromptStatus::RolledBack);
        assert_eq!(rolled_back.traffic, 0.0);
    }

    #[tokio::test]
    async fn test_tie_leaves_traffic_unchanged() {
        let store = MemoryStore::new();
        let (active_id, candidate_id) = seed(&store, 0.9, 0.1).await;
        feed(&store, active_id, 0.7, 20).await;
        feed(&store, candidate_id, 0.7, 20).await;

        canary_tick(&store, &CanaryConfig::default()).await.unwrap();

        assert!((store.get_prompt(active_id).unwrap().traffic - 0.9).abs() < 1e-9);
        assert!((store.get_prompt(candidate_id).unwrap().traffic - 0.1).abs() < 1e-9);
    }
}
