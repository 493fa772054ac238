//! First N turns extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{parse_turns, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message};

/// Extract the first N complete turns.
///
/// The first user message is the input; the agent replies (with the
/// interleaved follow-up user messages) form the output.
pub struct FirstNTurnsStrategy {
    n_turns: usize,
}

impl FirstNTurnsStrategy {
    pub fn new(n_turns: usize) -> Self {
        Self {
            n_turns: n_turns.max(1),
        }
    }
}

impl ExtractionStrategy for FirstNTurnsStrategy {
    fn name(&self) -> &'static str {
        "first_n_turns"
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

        let selected = &turns[..turns.len().min(self.n_turns)];
        let user_input = selected[0].user.clone();

        let agent_output = if selected.len() == 1 {
            selected[0].agent.clone()
        } else {
            let mut lines = vec![format!("Assistant: {}", selected[0].agent)];
            for turn in &selected[1..] {
                lines.push(format!("User: {}", turn.user));
                lines.push(format!("Assistant: {}", turn.agent));
            }
            lines.join("\n")
        };

        Some(Interaction::new(task_id, user_input, agent_output, feedback))
    }
}
