//! Summary context extraction strategy

use tracing::debug;
use uuid::Uuid;

use super::{parse_turns, ExtractionStrategy};
use crate::models::{FeedbackSignal, Interaction, Message, Turn};

/// How the summarized turns are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    #[default]
    Bullets,
    Paragraph,
}

/// Compress earlier turns into a short extractive summary and keep only
/// the most recent turns verbatim.
///
/// Meant for long conversations where the full history would blow past
/// any sensible input size. The summary is purely extractive (first
/// sentence or a truncated prefix of each message), no model calls.
pub struct SummaryContextStrategy {
    summary_turns: usize,
    recent_turns: usize,
    max_summary_length: usize,
    summary_format: SummaryFormat,
}

impl SummaryContextStrategy {
    pub fn new(
        summary_turns: usize,
        recent_turns: usize,
        max_summary_length: usize,
        summary_format: SummaryFormat,
    ) -> Self {
        Self {
            summary_turns: summary_turns.max(1),
            recent_turns: recent_turns.max(1),
            max_summary_length: max_summary_length.max(100),
            summary_format,
        }
    }

    fn create_summary(&self, turns: &[Turn]) -> String {
        if turns.is_empty() {
            return String::new();
        }

        let summary = match self.summary_format {
            SummaryFormat::Bullets => turns
                .iter()
                .enumerate()
                .map(|(i, turn)| {
                    format!(
                        "- Turn {}: {}; {}",
                        i + 1,
                        extract_key_point(&turn.user, "Asked"),
                        extract_key_point(&turn.agent, "Answered")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            SummaryFormat::Paragraph => turns
                .iter()
                .map(|turn| {
                    format!(
                        "{} {}.",
                        extract_key_point(&turn.user, "User asked about"),
                        extract_key_point(&turn.agent, "and received information on")
                    )
                })
                .collect::<Vec<_>>()
                .join(" "),
        };

        truncate_chars(&summary, self.max_summary_length)
    }
}

impl Default for SummaryContextStrategy {
    fn default() -> Self {
        Self::new(5, 2, 500, SummaryFormat::Bullets)
    }
}

/// First sentence of `text` if it ends within 100 characters, otherwise
/// a word-boundary truncation to roughly 80 characters.
fn extract_key_point(text: &str, prefix: &str) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let sentence_end = text
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, _)| i);

    let key_point = match sentence_end {
        Some(pos) if pos < 100 => text[..=pos].to_string(),
        _ if text.chars().count() > 80 => {
            let head: String = text.chars().take(80).collect();
            let clipped = match head.rfind(' ') {
                Some(space) => &head[..space],
                None => head.as_str(),
            };
            format!("{}...", clipped)
        }
        _ => text,
    };

    format!("{}: {}", prefix, key_point)
}

fn truncate_chars(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let head: String = text.chars().take(max_len - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Role-labeled rendering of recent turns, ending on the final user
/// message (whose answer becomes the output).
fn format_recent_turns(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return String::new();
    }
    if turns.len() == 1 {
        return turns[0].user.clone();
    }

    let mut lines = Vec::with_capacity(turns.len() * 2);
    for turn in &turns[..turns.len() - 1] {
        lines.push(format!("User: {}", turn.user));
        lines.push(format!("Assistant: {}", turn.agent));
    }
    lines.push(format!("User: {}", turns[turns.len() - 1].user));
    lines.join("\n")
}

impl ExtractionStrategy for SummaryContextStrategy {
    fn name(&self) -> &'static str {
        "summary_context"
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

        // Short conversations skip summarization entirely
        if turns.len() <= self.recent_turns {
            return Some(Interaction::new(
                task_id,
                format_recent_turns(&turns),
                turns[turns.len() - 1].agent.clone(),
                feedback,
            ));
        }

        let total_context = self.summary_turns + self.recent_turns;
        let (to_summarize, recent) = if turns.len() <= total_context {
            turns.split_at(turns.len() - self.recent_turns)
        } else {
            let relevant = &turns[turns.len() - total_context..];
            relevant.split_at(self.summary_turns)
        };

        let summary = self.create_summary(to_summarize);
        let recent_formatted = format_recent_turns(recent);

        let user_input = if summary.is_empty() {
            recent_formatted
        } else {
            format!(
                "[Previous conversation summary]\n{}\n\n[Recent conversation]\n{}",
                summary, recent_formatted
            )
        };

        Some(Interaction::new(
            task_id,
            user_input,
            turns[turns.len() - 1].agent.clone(),
            feedback,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testutil::qa_history;

    fn extract(strategy: &SummaryContextStrategy, turns: usize) -> Option<Interaction> {
        strategy.extract(
            Uuid::new_v4(),
            &qa_history(turns),
            &FeedbackSignal::default(),
        )
    }

    #[test]
    fn test_short_conversation_skips_summary() {
        let strategy = SummaryContextStrategy::default();
        let result = extract(&strategy, 2).unwrap();
        assert_eq!(result.user_input, "User: Q1\nAssistant: A1\nUser: Q2");
        assert_eq!(result.agent_output, "A2");
        assert!(!result.user_input.contains("[Previous conversation summary]"));
    }

    #[test]
    fn test_single_turn_verbatim() {
        let result = extract(&SummaryContextStrategy::default(), 1).unwrap();
        assert_eq!(result.user_input, "Q1");
        assert_eq!(result.agent_output, "A1");
    }

    #[test]
    fn test_long_conversation_summarizes_earlier_turns() {
        let strategy = SummaryContextStrategy::new(3, 2, 500, SummaryFormat::Bullets);
        let result = extract(&strategy, 5).unwrap();
        assert!(result.user_input.starts_with("[Previous conversation summary]\n"));
        assert!(result.user_input.contains("- Turn 1: Asked: Q1; Answered: A1"));
        assert!(result.user_input.contains("- Turn 3: Asked: Q3; Answered: A3"));
        assert!(result.user_input.contains("[Recent conversation]\nUser: Q4\nAssistant: A4\nUser: Q5"));
        assert_eq!(result.agent_output, "A5");
    }

    #[test]
    fn test_window_slides_to_end_of_long_history() {
        // 10 turns with summary_turns=3, recent_turns=2: only turns 6-10 matter
        let strategy = SummaryContextStrategy::new(3, 2, 500, SummaryFormat::Bullets);
        let result = extract(&strategy, 10).unwrap();
        assert!(result.user_input.contains("Asked: Q6"));
        assert!(!result.user_input.contains("Q5"));
        assert_eq!(result.agent_output, "A10");
    }

    #[test]
    fn test_paragraph_format() {
        let strategy = SummaryContextStrategy::new(2, 1, 500, SummaryFormat::Paragraph);
        let result = extract(&strategy, 3).unwrap();
        assert!(result.user_input.contains(
            "User asked about: Q1 and received information on: A1."
        ));
    }

    #[test]
    fn test_summary_truncated_to_max_length() {
        let strategy = SummaryContextStrategy::new(5, 1, 100, SummaryFormat::Bullets);
        let long_answer = "word ".repeat(60);
        let mut history = Vec::new();
        for i in 1..=6 {
            history.push(crate::strategies::testutil::msg("user", &format!("Question {}", i)));
            history.push(crate::strategies::testutil::msg("assistant", &long_answer));
        }
        let result = strategy
            .extract(Uuid::new_v4(), &history, &FeedbackSignal::default())
            .unwrap();
        let summary_section = result
            .user_input
            .split("\n\n[Recent conversation]")
            .next()
            .unwrap()
            .trim_start_matches("[Previous conversation summary]\n");
        assert!(summary_section.chars().count() <= 100);
        assert!(summary_section.ends_with("..."));
    }

    #[test]
    fn test_key_point_takes_first_sentence() {
        let point = extract_key_point("How do I install it? And also configure it?", "Asked");
        assert_eq!(point, "Asked: How do I install it?");
    }

    #[test]
    fn test_key_point_truncates_long_text_at_word_boundary() {
        let text = "alpha ".repeat(30);
        let point = extract_key_point(text.trim_end(), "Asked");
        assert!(point.ends_with("..."));
        assert!(point.chars().count() <= "Asked: ".len() + 83);
        // Cut lands on a word boundary, never mid-word
        assert!(point.trim_end_matches("...").ends_with("alpha"));
    }

    #[test]
    fn test_no_turns_returns_none() {
        assert!(extract(&SummaryContextStrategy::default(), 0).is_none());
    }
}
