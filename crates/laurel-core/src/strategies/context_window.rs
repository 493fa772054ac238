//! Context window extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{concat_window_inputs, parse_turns, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message};

/// Extract the last N turns, concatenating their user messages as the
/// input and keeping only the final agent reply as the output.
///
/// An optional system prompt is attached to the resulting interaction
/// (not concatenated into the text) for downstream consumers.
pub struct ContextWindowStrategy {
    n_turns: usize,
    system_prompt: Option<String>,
}

impl ContextWindowStrategy {
    pub fn new(n_turns: usize, system_prompt: Option<String>) -> Self {
        Self {
            n_turns: n_turns.max(1),
            system_prompt,
        }
    }
}

impl ExtractionStrategy for ContextWindowStrategy {
    fn name(&self) -> &'static str {
        "context_window"
    }

    fn extract(
        &self,
        task_id: Uuid,
        messages: &[Message],
        feedback: &FeedbackSignal,
    ) -> Option<Interaction> {
        let turns = parse_turns(messages);
        if turns.is_empty() {
            debug!(%task_id, "No complete turns found in history");
            return None;
        }

        let start = turns.len().saturating_sub(self.n_turns);
        let selected = &turns[start..];

        let mut interaction = Interaction::new(
            task_id,
            concat_window_inputs(selected),
            selected[selected.len() - 1].agent.clone(),
            feedback,
        );
        interaction.system_prompt = self.system_prompt.clone();
        Some(interaction)
    }
}
