use anyhow::{Context, Result};

use crate::canary::CanaryConfig;
use crate::dataset::DatasetConfig;
use crate::train::TrainConfig;

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,

    /// Endpoint of the external prompt-optimization engine
    pub optimizer_url: String,

    /// Extraction strategy spec, e.g. "last_turn" or "sliding_window:2:1:0"
    pub extraction_strategy: String,

    pub canary_traffic_step: f64,
    pub canary_min_interactions: i64,
    /// Seconds between controller ticks in the service binary
    pub canary_tick_interval_secs: u64,
    pub initial_candidate_traffic: f64,

    pub dataset_task_limit: i64,
    pub dataset_min_size: usize,
    pub dataset_max_size: usize,
    pub dataset_filter_by_feedback: bool,
    pub dataset_min_feedback_score: f64,
    pub dataset_require_feedback: bool,

    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,

            optimizer_url: std::env::var("OPTIMIZER_URL")
                .unwrap_or_else(|_| "http://localhost:8090/optimize".to_string()),

            extraction_strategy: std::env::var("EXTRACTION_STRATEGY")
                .unwrap_or_else(|_| "last_turn".to_string()),

            canary_traffic_step: env_parse("CANARY_TRAFFIC_STEP", 0.1),
            canary_min_interactions: env_parse("CANARY_MIN_INTERACTIONS", 10),
            canary_tick_interval_secs: env_parse("CANARY_TICK_INTERVAL_SECS", 300),
            initial_candidate_traffic: env_parse("CANARY_INITIAL_TRAFFIC", 0.10),

            dataset_task_limit: env_parse("DATASET_TASK_LIMIT", 500),
            dataset_min_size: env_parse("DATASET_MIN_SIZE", 10),
            dataset_max_size: env_parse("DATASET_MAX_SIZE", 10_000),
            dataset_filter_by_feedback: std::env::var("DATASET_FILTER_BY_FEEDBACK")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            dataset_min_feedback_score: env_parse("DATASET_MIN_FEEDBACK_SCORE", 0.7),
            dataset_require_feedback: std::env::var("DATASET_REQUIRE_FEEDBACK")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),

            http_port: std::env::var("HTTP_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("HTTP_PORT must be a valid port number")?,
        })
    }

    pub fn canary(&self) -> CanaryConfig {
        CanaryConfig {
            traffic_step: self.canary_traffic_step,
            min_candidate_interactions: self.canary_min_interactions,
        }
    }

    pub fn dataset(&self) -> DatasetConfig {
        DatasetConfig {
            task_limit: self.dataset_task_limit,
            min_dataset_size: self.dataset_min_size,
            max_dataset_size: self.dataset_max_size,
            min_input_chars: 3,
            min_output_chars: 3,
            filter_by_feedback: self.dataset_filter_by_feedback,
            min_feedback_score: self.dataset_min_feedback_score,
            require_feedback: self.dataset_require_feedback,
        }
    }

    pub fn train(&self) -> TrainConfig {
        TrainConfig {
            initial_candidate_traffic: self.initial_candidate_traffic,
            dataset: self.dataset(),
        }
    }
}
