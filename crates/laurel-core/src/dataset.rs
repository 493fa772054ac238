//! Golden dataset assembly
//!
//! Turns raw task rows into the cleaned, deduplicated training set the
//! optimization engine consumes. The pipeline is staged; every stage
//! that would produce an empty result aborts with a stage-naming error
//! instead of letting an empty dataset reach the optimizer.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extractor::InteractionExtractor;
use crate::models::{Feedback, FeedbackSignal, GoldenExample, Interaction, RawTask};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("No tasks found in storage")]
    NoTasks,
    #[error("No interactions extracted from {task_count} tasks")]
    NothingExtracted { task_count: usize },
    #[error("All interactions filtered out by feedback quality thresholds")]
    AllFilteredOut,
    #[error("No interactions survived validation and cleaning")]
    NothingValid,
    #[error("Dataset too small: {actual} examples, minimum is {min}")]
    TooSmall { actual: usize, min: usize },
}

/// Tunables for the dataset pipeline.
///
/// The feedback-quality filter ships disabled; flipping
/// `filter_by_feedback` re-enables the stage without code changes.
#[derive(Clone, Debug)]
pub struct DatasetConfig {
    /// How many recent tasks to fetch from storage
    pub task_limit: i64,
    pub min_dataset_size: usize,
    /// Soft cap; exceeding it logs a warning, never an error
    pub max_dataset_size: usize,
    pub min_input_chars: usize,
    pub min_output_chars: usize,
    pub filter_by_feedback: bool,
    pub min_feedback_score: f64,
    pub require_feedback: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            task_limit: 500,
            min_dataset_size: 10,
            max_dataset_size: 10_000,
            min_input_chars: 3,
            min_output_chars: 3,
            filter_by_feedback: false,
            min_feedback_score: 0.7,
            require_feedback: false,
        }
    }
}

/// Map raw feedback JSON to a normalized signal.
///
/// `rating` on a 1-5 scale divides by 5; `thumbs_up` (boolean or
/// string-encoded) maps to 1.0/0.0. Anything else yields an empty
/// signal rather than an error, so one odd row never sinks a run.
pub fn normalize_feedback(feedback_data: Option<&Value>) -> FeedbackSignal {
    let Some(obj) = feedback_data.and_then(|v| v.as_object()) else {
        return FeedbackSignal::default();
    };

    if let Some(rating) = obj.get("rating").and_then(|v| v.as_f64()) {
        return FeedbackSignal {
            score: Some((rating / 5.0).clamp(0.0, 1.0)),
            kind: Some("rating".to_string()),
        };
    }

    if let Some(thumbs) = obj.get("thumbs_up") {
        let up = match thumbs {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if let Some(up) = up {
            return FeedbackSignal {
                score: Some(if up { 1.0 } else { 0.0 }),
                kind: Some("thumbs_up".to_string()),
            };
        }
    }

    FeedbackSignal::default()
}

fn filter_by_feedback(
    interactions: Vec<Interaction>,
    config: &DatasetConfig,
) -> Vec<Interaction> {
    interactions
        .into_iter()
        .filter(|interaction| match interaction.feedback_score {
            Some(score) => score >= config.min_feedback_score,
            None => !config.require_feedback,
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace, drop too-short pairs and pairs whose input
/// equals their output after cleaning.
pub fn validate_and_clean(
    interactions: Vec<Interaction>,
    config: &DatasetConfig,
) -> Vec<Interaction> {
    interactions
        .into_iter()
        .filter_map(|interaction| {
            let input = collapse_whitespace(&interaction.user_input);
            let output = collapse_whitespace(&interaction.agent_output);

            if input.chars().count() < config.min_input_chars
                || output.chars().count() < config.min_output_chars
            {
                return None;
            }
            if input == output {
                return None;
            }

            Some(Interaction {
                user_input: input,
                agent_output: output,
                ..interaction
            })
        })
        .collect()
}

/// Drop repeated (input, output) pairs, keeping the first occurrence.
pub fn deduplicate(interactions: Vec<Interaction>) -> Vec<Interaction> {
    let mut seen = std::collections::HashSet::new();
    interactions
        .into_iter()
        .filter(|interaction| {
            seen.insert((interaction.user_input.clone(), interaction.agent_output.clone()))
        })
        .collect()
}

fn finalize(interactions: Vec<Interaction>) -> Vec<GoldenExample> {
    interactions
        .into_iter()
        .map(|interaction| {
            let feedback = match (interaction.feedback_score, interaction.feedback_type) {
                (Some(score), Some(kind)) => Some(Feedback { score, kind }),
                _ => None,
            };
            GoldenExample {
                input: interaction.user_input,
                output: interaction.agent_output,
                feedback,
            }
        })
        .collect()
}

/// Run the full pipeline over already-fetched tasks.
///
/// Stages: normalize feedback, extract, (optional) quality filter,
/// validate and clean, deduplicate, finalize, size check.
pub fn build_golden_dataset(
    tasks: &[RawTask],
    extractor: &InteractionExtractor,
    config: &DatasetConfig,
) -> Result<Vec<GoldenExample>, DatasetError> {
    if tasks.is_empty() {
        return Err(DatasetError::NoTasks);
    }

    let mut interactions = Vec::new();
    for task in tasks {
        let feedback = normalize_feedback(task.feedback_data.as_ref());
        interactions.extend(extractor.extract_all(task.id, &task.history, &feedback));
    }
    debug!(
        tasks = tasks.len(),
        interactions = interactions.len(),
        strategy = extractor.strategy_name(),
        "Extraction complete"
    );
    if interactions.is_empty() {
        return Err(DatasetError::NothingExtracted {
            task_count: tasks.len(),
        });
    }

    if config.filter_by_feedback {
        let before = interactions.len();
        interactions = filter_by_feedback(interactions, config);
        debug!(before, after = interactions.len(), "Feedback quality filter applied");
        if interactions.is_empty() {
            return Err(DatasetError::AllFilteredOut);
        }
    }

    interactions = validate_and_clean(interactions, config);
    if interactions.is_empty() {
        return Err(DatasetError::NothingValid);
    }

    interactions = deduplicate(interactions);

    let dataset = finalize(interactions);

    if dataset.len() < config.min_dataset_size {
        return Err(DatasetError::TooSmall {
            actual: dataset.len(),
            min: config.min_dataset_size,
        });
    }
    if dataset.len() > config.max_dataset_size {
        warn!(
            size = dataset.len(),
            max = config.max_dataset_size,
            "Dataset exceeds recommended maximum"
        );
    }

    info!(examples = dataset.len(), "Golden dataset ready");
    Ok(dataset)
}
