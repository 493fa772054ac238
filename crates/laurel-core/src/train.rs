//! Training orchestration
//!
//! Drives one optimization run end to end: guard, fetch, dataset
//! build, optimize, and A/B test initialization. The run only sets up
//! the experiment; promotion and rollback belong to the canary
//! controller.

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{error, info};

use crate::dataset::{build_golden_dataset, DatasetConfig, DatasetError};
use crate::extractor::InteractionExtractor;
use crate::models::PromptStatus;
use crate::optimizer::{OptimizerError, PromptOptimizer};
use crate::storage::{PromptStore, TaskSource};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(
        "Training blocked: a candidate prompt (id={candidate_id}) is already being tested. \
         Wait for the experiment to conclude before starting new training."
    )]
    ExperimentActive { candidate_id: i32 },
    #[error("No active prompt found; an active prompt is required to seed optimization")]
    NoActivePrompt,
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Traffic split a fresh experiment starts with.
#[derive(Clone, Debug)]
pub struct TrainConfig {
    pub initial_candidate_traffic: f64,
    pub dataset: DatasetConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            initial_candidate_traffic: 0.10,
            dataset: DatasetConfig::default(),
        }
    }
}

/// Guard: refuse to train while an experiment is in flight.
///
/// Advisory only; the status uniqueness constraint in storage is what
/// actually prevents a second candidate from landing.
pub async fn ensure_no_experiment<S: PromptStore + ?Sized>(store: &S) -> Result<(), TrainError> {
    if let Some(candidate) = store.get_candidate_prompt().await? {
        error!(
            candidate_id = candidate.id,
            "Training blocked, experiment still active"
        );
        return Err(TrainError::ExperimentActive {
            candidate_id: candidate.id,
        });
    }
    info!("Stability check passed, no candidate prompt exists");
    Ok(())
}

/// Run one full training pass and initialize the A/B test.
///
/// After the candidate insert the remaining steps are best-effort
/// sequential: a failure leaves a dangling candidate for an operator to
/// resolve by hand rather than attempting automatic compensation.
pub async fn run_training<S>(
    store: &S,
    optimizer: &dyn PromptOptimizer,
    extractor: &InteractionExtractor,
    config: &TrainConfig,
) -> Result<i32, TrainError>
where
    S: PromptStore + TaskSource + ?Sized,
{
    info!("Starting training pipeline");

    ensure_no_experiment(store).await?;

    let active = store
        .get_active_prompt()
        .await?
        .ok_or(TrainError::NoActivePrompt)?;

    let tasks = store
        .fetch_tasks_with_feedback(config.dataset.task_limit)
        .await
        .context("Failed to fetch tasks")?;
    info!(tasks = tasks.len(), "Fetched raw tasks");

    let dataset = build_golden_dataset(&tasks, extractor, &config.dataset)?;
    info!(
        examples = dataset.len(),
        strategy = extractor.strategy_name(),
        "Golden dataset built"
    );

    let refined = optimizer.optimize(&active.prompt_text, &dataset).await?;

    let candidate_traffic = config.initial_candidate_traffic;
    let candidate_id = store
        .insert_prompt(&refined, PromptStatus::Candidate, candidate_traffic)
        .await
        .context("Failed to insert candidate prompt")?;
    info!(candidate_id, "Candidate prompt inserted");

    let active_traffic = 1.0 - candidate_traffic;
    store
        .update_prompt_traffic(active.id, active_traffic)
        .await
        .context("Failed to set active prompt traffic")?;
    store
        .zero_out_all_except(&[active.id, candidate_id])
        .await
        .context("Failed to zero out other prompts")?;

    info!(
        active_id = active.id,
        candidate_id, active_traffic, candidate_traffic, "A/B test initialized"
    );
    Ok(candidate_id)
}
