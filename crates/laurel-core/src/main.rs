//! Canary controller service
//!
//! Runs the traffic controller on a fixed interval and serves a health
//! endpoint. Training runs are separate (see the `optimize` binary).

use anyhow::Result;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use laurel_core::canary::run_canary_tick;
use laurel_core::config::Config;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint - returns 200 OK when the service is running
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "laurel=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Laurel canary controller starting up...");

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Tick interval: {}s", config.canary_tick_interval_secs);
    info!("  Traffic step: {}", config.canary_traffic_step);

    // Run database migrations first
    {
        use diesel::prelude::*;
        use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
        pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

        let mut conn = diesel::PgConnection::establish(&config.database_url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
        info!("Database migrations applied");
    }

    // Start HTTP health check server
    let health_router = Router::new().route("/health", get(health_check));
    let health_listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health_router).await {
            error!("Health check server error: {}", e);
        }
    });
    info!("Health check server listening on port {}", config.http_port);

    let canary_config = config.canary();
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_secs(
        config.canary_tick_interval_secs,
    ));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Skip the first immediate tick
    tick_interval.tick().await;
    info!(
        "Canary controller scheduled (every {}s)",
        config.canary_tick_interval_secs
    );

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                info!("Running canary tick...");
                if let Err(e) = run_canary_tick(&config.database_url, &canary_config).await {
                    error!("Canary tick failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}
