//! Offline prompt optimization with canary rollout
//!
//! Mines historical conversations into training data, hands it to an
//! external optimization engine, and rolls the refined prompt out
//! gradually via traffic-weighted A/B testing with automatic promotion
//! or rollback.

pub mod canary;
pub mod config;
pub mod dataset;
pub mod db;
pub mod extractor;
pub mod models;
pub mod optimizer;
pub mod schema;
pub mod selector;
pub mod similarity;
pub mod storage;
pub mod strategies;
pub mod train;

pub use canary::{canary_tick, compare_metrics, run_canary_tick, CanaryConfig, CompareOutcome};
pub use config::Config;
pub use dataset::{build_golden_dataset, normalize_feedback, DatasetConfig, DatasetError};
pub use extractor::{clean_messages, InteractionExtractor};
pub use selector::select_prompt;
pub use similarity::{compute_similarity, SimilarityMethod};
pub use strategies::{build_strategy, parse_turns, ExtractionStrategy};
pub use train::{ensure_no_experiment, run_training, TrainConfig, TrainError};
