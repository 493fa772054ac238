//! One-shot training run
//!
//! Usage:
//!   cargo run --bin optimize -- [--strategy SPEC] [--require-feedback] [--dry-run]
//!
//! `--strategy` takes a spec string such as `last_turn`, `last_n:3`, or
//! `sliding_window:2:1:0`. `--dry-run` builds and prints the dataset
//! without calling the optimization engine or touching prompt records.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use laurel_core::config::Config;
use laurel_core::dataset::build_golden_dataset;
use laurel_core::db::PgStore;
use laurel_core::extractor::InteractionExtractor;
use laurel_core::optimizer::HttpOptimizer;
use laurel_core::storage::TaskSource;
use laurel_core::strategies::build_strategy;
use laurel_core::train::run_training;

struct Args {
    strategy: Option<String>,
    require_feedback: bool,
    dry_run: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        strategy: None,
        require_feedback: false,
        dry_run: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strategy" => {
                args.strategy = Some(
                    iter.next()
                        .context("--strategy requires a value, e.g. last_turn or last_n:3")?,
                );
            }
            "--require-feedback" => args.require_feedback = true,
            "--dry-run" => args.dry_run = true,
            other => anyhow::bail!(
                "Unknown argument: {}. Usage: optimize [--strategy SPEC] [--require-feedback] [--dry-run]",
                other
            ),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "laurel=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let args = parse_args()?;

    let spec = args
        .strategy
        .unwrap_or_else(|| config.extraction_strategy.clone());
    let extractor = InteractionExtractor::new(build_strategy(&spec)?);

    let mut train_config = config.train();
    if args.require_feedback {
        train_config.dataset.filter_by_feedback = true;
        train_config.dataset.require_feedback = true;
    }

    let store = PgStore::connect(&config.database_url)?;

    if args.dry_run {
        info!("Dry run: building dataset without optimizing");
        let tasks = store
            .fetch_tasks_with_feedback(train_config.dataset.task_limit)
            .await?;
        let dataset = build_golden_dataset(&tasks, &extractor, &train_config.dataset)?;
        println!("{}", serde_json::to_string_pretty(&dataset)?);
        return Ok(());
    }

    let optimizer = HttpOptimizer::new(config.optimizer_url.clone())?;
    let candidate_id = run_training(&store, &optimizer, &extractor, &train_config).await?;
    info!(candidate_id, "Training complete, A/B test initialized");
    Ok(())
}
