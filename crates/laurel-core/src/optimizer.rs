//! Client for the external prompt-optimization engine
//!
//! The engine is a black box: it takes the current prompt plus the
//! golden dataset and returns refined prompt text. Everything about how
//! it optimizes is its business; this module only speaks its API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::GoldenExample;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Engine error: {status} - {message}")]
    Engine { status: u16, message: String },
    #[error("Engine returned an empty prompt")]
    EmptyPrompt,
}

/// The opaque optimize step: `(base prompt, dataset) -> refined text`.
#[async_trait]
pub trait PromptOptimizer: Send + Sync {
    async fn optimize(
        &self,
        base_prompt: &str,
        dataset: &[GoldenExample],
    ) -> Result<String, OptimizerError>;
}

#[derive(Serialize)]
struct OptimizeRequest<'a> {
    base_prompt: &'a str,
    dataset: &'a [GoldenExample],
}

#[derive(Deserialize)]
struct OptimizeResponse {
    refined_prompt: String,
}

/// HTTP client for an optimization engine exposing a JSON endpoint.
#[derive(Clone)]
pub struct HttpOptimizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOptimizer {
    pub fn new(endpoint: String) -> Result<Self, OptimizerError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Laurel/0.1.0")
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PromptOptimizer for HttpOptimizer {
    async fn optimize(
        &self,
        base_prompt: &str,
        dataset: &[GoldenExample],
    ) -> Result<String, OptimizerError> {
        debug!(
            endpoint = %self.endpoint,
            examples = dataset.len(),
            "Requesting prompt optimization"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&OptimizeRequest {
                base_prompt,
                dataset,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OptimizerError::Engine {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body: OptimizeResponse = response.json().await?;
        let refined = body.refined_prompt.trim().to_string();
        if refined.is_empty() {
            return Err(OptimizerError::EmptyPrompt);
        }

        info!(chars = refined.len(), "Received refined prompt");
        Ok(refined)
    }
}
