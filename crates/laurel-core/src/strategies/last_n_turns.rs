//! Last N turns extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{format_labeled_turns, parse_turns, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message};

/// Extract the last N complete turns.
///
/// Earlier turns (all but the last) become labeled context prepended to
/// the final user message; the final agent reply is the output.
pub struct LastNTurnsStrategy {
    n_turns: usize,
}

impl LastNTurnsStrategy {
    pub fn new(n_turns: usize) -> Self {
        Self {
            n_turns: n_turns.max(1),
        }
    }
}

impl ExtractionStrategy for LastNTurnsStrategy {
    fn name(&self) -> &'static str {
        "last_n_turns"
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

        let (user_input, agent_output) = if selected.len() == 1 {
            (selected[0].user.clone(), selected[0].agent.clone())
        } else {
            let context = format_labeled_turns(&selected[..selected.len() - 1]);
            let last = &selected[selected.len() - 1];
            (
                format!("{}\n\nUser: {}", context, last.user),
                last.agent.clone(),
            )
        };

        Some(Interaction::new(task_id, user_input, agent_output, feedback))
    }
}
