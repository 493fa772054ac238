//! Value types shared across the optimization pipeline
//!
//! Everything in this module is a plain data carrier. Records are never
//! mutated after construction - rebuild the value to change a field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// A single cleaned conversation message.
///
/// Produced by `extractor::clean_messages`; `content` is trimmed and
/// guaranteed non-empty once cleaning has run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// One user utterance paired with the agent's reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub agent: String,
}

/// Normalized feedback attached to a task, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedbackSignal {
    /// Score in [0.0, 1.0], None when the task has no usable feedback
    pub score: Option<f64>,
    /// Feedback kind, e.g. "rating" or "thumbs_up"
    pub kind: Option<String>,
}

/// A single extracted (input, output) training example.
#[derive(Clone, Debug, PartialEq)]
pub struct Interaction {
    pub task_id: Uuid,
    pub user_input: String,
    pub agent_output: String,
    pub feedback_score: Option<f64>,
    pub feedback_type: Option<String>,
    /// Attached by strategies that carry a system prompt (context_window)
    pub system_prompt: Option<String>,
}

impl Interaction {
    pub fn new(
        task_id: Uuid,
        user_input: String,
        agent_output: String,
        feedback: &FeedbackSignal,
    ) -> Self {
        Self {
            task_id,
            user_input,
            agent_output,
            feedback_score: feedback.score,
            feedback_type: feedback.kind.clone(),
            system_prompt: None,
        }
    }
}

/// Feedback as it appears in a finalized golden dataset entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub score: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Final training example handed to the optimization engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoldenExample {
    pub input: String,
    pub output: String,
    pub feedback: Option<Feedback>,
}

/// Raw task row joined with optional feedback, as fetched from storage.
#[derive(Clone, Debug)]
pub struct RawTask {
    pub id: Uuid,
    /// Conversation history as stored: role/content message objects
    pub history: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub feedback_data: Option<serde_json::Value>,
}

/// Lifecycle status of a prompt record.
///
/// `Deprecated` and `RolledBack` are terminal; the record is retained
/// for audit but never receives traffic again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Active,
    Candidate,
    Deprecated,
    RolledBack,
}

impl PromptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStatus::Active => "active",
            PromptStatus::Candidate => "candidate",
            PromptStatus::Deprecated => "deprecated",
            PromptStatus::RolledBack => "rolled_back",
        }
    }
}

impl FromStr for PromptStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PromptStatus::Active),
            "candidate" => Ok(PromptStatus::Candidate),
            "deprecated" => Ok(PromptStatus::Deprecated),
            "rolled_back" => Ok(PromptStatus::RolledBack),
            _ => Err(anyhow::anyhow!(
                "Invalid prompt status: {}. Must be one of active, candidate, deprecated, rolled_back",
                s
            )),
        }
    }
}

/// Persistent prompt record with canary bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptRecord {
    pub id: i32,
    pub prompt_text: String,
    pub status: PromptStatus,
    /// Fraction of live traffic in [0.0, 1.0]
    pub traffic: f64,
    pub num_interactions: i64,
    /// Running weighted average of feedback, None until first feedback
    pub average_feedback_score: Option<f64>,
}
