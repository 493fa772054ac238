//! Key turns extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{parse_turns, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message, Turn};
use crate::similarity::{compute_similarity, SimilarityMethod};

/// Select the turns most relevant to the final exchange, scored by text
/// similarity against the final turn.
///
/// Earlier turns are ranked by similarity to the last turn, the top N
/// are kept, and chronological order is restored before formatting. The
/// final turn is always included by default since it carries the query
/// being answered.
pub struct KeyTurnsStrategy {
    n_turns: usize,
    similarity_method: SimilarityMethod,
    include_final: bool,
    use_both_messages: bool,
}

impl KeyTurnsStrategy {
    pub fn new(n_turns: usize, similarity_method: SimilarityMethod) -> Self {
        Self {
            n_turns: n_turns.max(1),
            similarity_method,
            include_final: true,
            use_both_messages: true,
        }
    }

    /// Whether the final turn is always kept regardless of its score.
    pub fn include_final(mut self, include_final: bool) -> Self {
        self.include_final = include_final;
        self
    }

    /// Whether similarity is scored over user and agent text together,
    /// or over the user message alone.
    pub fn use_both_messages(mut self, use_both_messages: bool) -> Self {
        self.use_both_messages = use_both_messages;
        self
    }

    fn turn_text(&self, turn: &Turn) -> String {
        if self.use_both_messages {
            format!("{} {}", turn.user, turn.agent)
        } else {
            turn.user.clone()
        }
    }

    fn interaction_from_turns(
        &self,
        task_id: Uuid,
        turns: &[Turn],
        feedback: &FeedbackSignal,
    ) -> Interaction {
        let agent_output = turns[turns.len() - 1].agent.clone();

        let user_input = if turns.len() == 1 {
            turns[0].user.clone()
        } else {
            let mut lines = Vec::new();
            for (i, turn) in turns[..turns.len() - 1].iter().enumerate() {
                lines.push(format!("[Key context {}]", i + 1));
                lines.push(format!("User: {}", turn.user));
                lines.push(format!("Assistant: {}", turn.agent));
            }
            lines.push(String::new());
            lines.push("[Current query]".to_string());
            lines.push(format!("User: {}", turns[turns.len() - 1].user));
            lines.join("\n")
        };

        Interaction::new(task_id, user_input, agent_output, feedback)
    }
}

impl ExtractionStrategy for KeyTurnsStrategy {
    fn name(&self) -> &'static str {
        "key_turns"
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

        if turns.len() <= self.n_turns {
            return Some(self.interaction_from_turns(task_id, &turns, feedback));
        }

        let final_turn = &turns[turns.len() - 1];
        let reference_text = self.turn_text(final_turn);

        let corpus: Option<Vec<String>> = match self.similarity_method {
            SimilarityMethod::Weighted => {
                Some(turns.iter().map(|t| self.turn_text(t)).collect())
            }
            _ => None,
        };

        let mut scored: Vec<(usize, f64)> = turns[..turns.len() - 1]
            .iter()
            .enumerate()
            .map(|(idx, turn)| {
                let score = compute_similarity(
                    &self.turn_text(turn),
                    &reference_text,
                    self.similarity_method,
                    corpus.as_deref(),
                );
                (idx, score)
            })
            .collect();

        // Stable sort keeps earlier turns first among ties
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let num_to_select = if self.include_final {
            self.n_turns - 1
        } else {
            self.n_turns
        };
        scored.truncate(num_to_select);
        scored.sort_by_key(|(idx, _)| *idx);

        let mut key_turns: Vec<Turn> = scored.iter().map(|(idx, _)| turns[*idx].clone()).collect();
        if self.include_final {
            key_turns.push(final_turn.clone());
        }

        if key_turns.is_empty() {
            debug!(%task_id, "No key turns selected");
            return None;
        }

        Some(self.interaction_from_turns(task_id, &key_turns, feedback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testutil::msg;

    fn history() -> Vec<Message> {
        // Turns 2 and 4 share vocabulary with the final turn about Rust traits
        vec![
            msg("user", "tell me about cooking pasta"),
            msg("assistant", "boil water and add salt"),
            msg("user", "how do rust traits work"),
            msg("assistant", "traits define shared behavior in rust"),
            msg("user", "what is the weather today"),
            msg("assistant", "sunny with light wind"),
            msg("user", "can rust traits have default methods"),
            msg("assistant", "yes rust traits support default methods"),
            msg("user", "show rust traits with generic bounds"),
            msg("assistant", "use rust traits as generic bounds with impl"),
        ]
    }

    #[test]
    fn test_selects_similar_turns_in_chronological_order() {
        let strategy = KeyTurnsStrategy::new(3, SimilarityMethod::Jaccard);
        let result = strategy
            .extract(Uuid::new_v4(), &history(), &FeedbackSignal::default())
            .unwrap();

        // Turns about rust traits are kept, pasta and weather dropped
        assert!(result.user_input.contains("how do rust traits work"));
        assert!(result.user_input.contains("default methods"));
        assert!(!result.user_input.contains("pasta"));
        assert!(!result.user_input.contains("weather"));

        // Chronological order restored after ranking
        let first = result.user_input.find("how do rust traits work").unwrap();
        let second = result.user_input.find("default methods").unwrap();
        assert!(first < second);

        assert!(result
            .user_input
            .ends_with("[Current query]\nUser: show rust traits with generic bounds"));
        assert_eq!(
            result.agent_output,
            "use rust traits as generic bounds with impl"
        );
    }

    #[test]
    fn test_few_turns_uses_all() {
        let strategy = KeyTurnsStrategy::new(5, SimilarityMethod::Jaccard);
        let messages = vec![
            msg("user", "Q1"),
            msg("assistant", "A1"),
            msg("user", "Q2"),
            msg("assistant", "A2"),
        ];
        let result = strategy
            .extract(Uuid::new_v4(), &messages, &FeedbackSignal::default())
            .unwrap();
        assert!(result.user_input.contains("[Key context 1]"));
        assert!(result.user_input.contains("User: Q1"));
        assert_eq!(result.agent_output, "A2");
    }

    #[test]
    fn test_single_turn_plain_pair() {
        let strategy = KeyTurnsStrategy::new(3, SimilarityMethod::Jaccard);
        let messages = vec![msg("user", "Q1"), msg("assistant", "A1")];
        let result = strategy
            .extract(Uuid::new_v4(), &messages, &FeedbackSignal::default())
            .unwrap();
        assert_eq!(result.user_input, "Q1");
        assert_eq!(result.agent_output, "A1");
    }

    #[test]
    fn test_without_final_turn_pure_ranking() {
        let strategy = KeyTurnsStrategy::new(2, SimilarityMethod::Jaccard).include_final(false);
        let result = strategy
            .extract(Uuid::new_v4(), &history(), &FeedbackSignal::default())
            .unwrap();

        // Both slots go to ranked turns; the final turn is not appended
        assert!(result.user_input.contains("how do rust traits work"));
        assert!(!result
            .user_input
            .contains("show rust traits with generic bounds"));
        assert_eq!(
            result.agent_output,
            "yes rust traits support default methods"
        );
    }

    #[test]
    fn test_user_only_scoring_ignores_agent_text() {
        let messages = vec![
            msg("user", "apple banana"),
            msg("assistant", "zebra"),
            msg("user", "zzz"),
            msg("assistant", "apple banana cherry"),
            msg("user", "apple banana"),
            msg("assistant", "final answer"),
        ];
        let strategy =
            KeyTurnsStrategy::new(2, SimilarityMethod::Jaccard).use_both_messages(false);
        let result = strategy
            .extract(Uuid::new_v4(), &messages, &FeedbackSignal::default())
            .unwrap();

        // The matching user text wins even though the other turn's agent
        // reply overlaps with the query
        assert!(result.user_input.contains("zebra"));
        assert!(!result.user_input.contains("zzz"));
    }

    #[test]
    fn test_weighted_method_runs() {
        let strategy = KeyTurnsStrategy::new(2, SimilarityMethod::Weighted);
        let result = strategy.extract(Uuid::new_v4(), &history(), &FeedbackSignal::default());
        assert!(result.is_some());
    }

    #[test]
    fn test_empty_history_returns_none() {
        let strategy = KeyTurnsStrategy::new(3, SimilarityMethod::Jaccard);
        assert!(strategy
            .extract(Uuid::new_v4(), &[], &FeedbackSignal::default())
            .is_none());
    }
}
