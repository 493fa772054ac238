//! Full history extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{is_user_role, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message};

/// Default cap on the formatted conversation length, in characters.
pub const DEFAULT_MAX_HISTORY_CHARS: usize = 10_000;

/// Extract the first user input and the entire rest of the conversation
/// as the output, one "Role: content" line per message.
///
/// Conversations whose formatted output exceeds `max_chars` are dropped
/// rather than truncated - a clipped conversation is a misleading
/// training target.
pub struct FullHistoryStrategy {
    max_chars: usize,
}

impl FullHistoryStrategy {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for FullHistoryStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_CHARS)
    }
}

/// Capitalize the first ASCII letter of a role for display.
fn display_role(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

impl ExtractionStrategy for FullHistoryStrategy {
    fn name(&self) -> &'static str {
        "full_history"
    }

    fn extract(
        &self,
        task_id: Uuid,
        messages: &[Message],
        feedback: &FeedbackSignal,
    ) -> Option<Interaction> {
        let first_user_idx = messages.iter().position(|m| is_user_role(&m.role));
        let Some(first_user_idx) = first_user_idx else {
            debug!(%task_id, "No user message found in history");
            return None;
        };

        let user_input = messages[first_user_idx].content.clone();
        let remaining = &messages[first_user_idx + 1..];
        if remaining.is_empty() {
            debug!(%task_id, "No messages after first user input");
            return None;
        }

        let agent_output = remaining
            .iter()
            .map(|m| format!("{}: {}", display_role(&m.role), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        if agent_output.len() > self.max_chars {
            debug!(
                %task_id,
                length = agent_output.len(),
                max = self.max_chars,
                "Full history exceeds max length, dropping"
            );
            return None;
        }

        Some(Interaction::new(task_id, user_input, agent_output, feedback))
    }
}
