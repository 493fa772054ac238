//! Last turn extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{is_agent_role, is_user_role, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message};

/// Extract only the most recent complete user/assistant exchange.
///
/// The simplest strategy and the default: the last assistant message is
/// the output, the nearest preceding user message is the input.
pub struct LastTurnStrategy;

impl ExtractionStrategy for LastTurnStrategy {
    fn name(&self) -> &'static str {
        "last_turn"
    }

    fn extract(
        &self,
        task_id: Uuid,
        messages: &[Message],
        feedback: &FeedbackSignal,
    ) -> Option<Interaction> {
        let agent_idx = messages.iter().rposition(|m| is_agent_role(&m.role));

        let (user_input, agent_output) = match agent_idx {
            Some(idx) => {
                let output = messages[idx].content.clone();
                let input = messages[..idx]
                    .iter()
                    .rev()
                    .find(|m| is_user_role(&m.role))
                    .map(|m| m.content.clone());
                (input, Some(output))
            }
            None => (None, None),
        };

        match (user_input, agent_output) {
            (Some(input), Some(output)) => {
                Some(Interaction::new(task_id, input, output, feedback))
            }
            (input, output) => {
                debug!(
                    %task_id,
                    has_user_input = input.is_some(),
                    has_agent_output = output.is_some(),
                    "Could not extract last turn"
                );
                None
            }
        }
    }
}
