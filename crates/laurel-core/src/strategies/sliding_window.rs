//! Sliding window extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{concat_window_inputs, parse_turns, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message, Turn};

/// Slide a fixed-size window of turns across a conversation, producing
/// one interaction per window position.
///
/// This is the only strategy whose `extract_all` yields more than one
/// interaction from a single conversation. `extract` alone returns just
/// the final window. With stride 1 windows overlap; with stride equal
/// to the window size they tile the conversation.
pub struct SlidingWindowStrategy {
    window_size: usize,
    stride: usize,
    start_offset: usize,
}

impl SlidingWindowStrategy {
    pub fn new(window_size: usize, stride: usize, start_offset: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            stride: stride.max(1),
            start_offset,
        }
    }

    fn window_interaction(
        &self,
        task_id: Uuid,
        window: &[Turn],
        feedback: &FeedbackSignal,
    ) -> Interaction {
        Interaction::new(
            task_id,
            concat_window_inputs(window),
            window[window.len() - 1].agent.clone(),
            feedback,
        )
    }
}

impl ExtractionStrategy for SlidingWindowStrategy {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn extract(
        &self,
        task_id: Uuid,
        messages: &[Message],
        feedback: &FeedbackSignal,
    ) -> Option<Interaction> {
        let turns = parse_turns(messages);
        if turns.len() < self.window_size {
            debug!(
                %task_id,
                turns = turns.len(),
                window = self.window_size,
                "Not enough turns for window"
            );
            return None;
        }

        let window = &turns[turns.len() - self.window_size..];
        Some(self.window_interaction(task_id, window, feedback))
    }

    fn extract_all(
        &self,
        task_id: Uuid,
        messages: &[Message],
        feedback: &FeedbackSignal,
    ) -> Vec<Interaction> {
        let turns = parse_turns(messages);
        let effective_start = self.start_offset.min(turns.len());

        if turns.len() - effective_start < self.window_size {
            debug!(
                %task_id,
                available = turns.len() - effective_start,
                required = self.window_size,
                "Not enough turns for sliding window after offset"
            );
            return Vec::new();
        }

        let mut interactions = Vec::new();
        let mut start_idx = effective_start;
        while start_idx + self.window_size <= turns.len() {
            let window = &turns[start_idx..start_idx + self.window_size];
            interactions.push(self.window_interaction(task_id, window, feedback));
            start_idx += self.stride;
        }

        debug!(
            %task_id,
            count = interactions.len(),
            window = self.window_size,
            stride = self.stride,
            offset = self.start_offset,
            "Extracted sliding window interactions"
        );
        interactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testutil::qa_history;

    fn all(window: usize, stride: usize, offset: usize, turns: usize) -> Vec<Interaction> {
        SlidingWindowStrategy::new(window, stride, offset).extract_all(
            Uuid::new_v4(),
            &qa_history(turns),
            &FeedbackSignal::default(),
        )
    }

    #[test]
    fn test_overlapping_windows_count() {
        // K turns, window W, stride 1: K - W + 1 windows
        let results = all(2, 1, 0, 4);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].user_input, "Q1\n\nQ2");
        assert_eq!(results[0].agent_output, "A2");
        assert_eq!(results[2].user_input, "Q3\n\nQ4");
        assert_eq!(results[2].agent_output, "A4");
    }

    #[test]
    fn test_non_overlapping_stride() {
        let results = all(2, 2, 0, 4);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].agent_output, "A2");
        assert_eq!(results[1].agent_output, "A4");
    }

    #[test]
    fn test_start_offset_skips_turns() {
        let results = all(2, 1, 1, 4);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].user_input, "Q2\n\nQ3");
    }

    #[test]
    fn test_too_few_turns_after_offset() {
        assert!(all(2, 1, 3, 4).is_empty());
        assert!(all(3, 1, 0, 2).is_empty());
    }

    #[test]
    fn test_extract_returns_last_window_only() {
        let result = SlidingWindowStrategy::new(2, 1, 0)
            .extract(Uuid::new_v4(), &qa_history(4), &FeedbackSignal::default())
            .unwrap();
        assert_eq!(result.user_input, "Q3\n\nQ4");
        assert_eq!(result.agent_output, "A4");
    }

    #[test]
    fn test_extract_none_when_short() {
        assert!(SlidingWindowStrategy::new(3, 1, 0)
            .extract(Uuid::new_v4(), &qa_history(2), &FeedbackSignal::default())
            .is_none());
    }

    #[test]
    fn test_exact_fit_single_window() {
        let results = all(3, 1, 0, 3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].agent_output, "A3");
    }
}
