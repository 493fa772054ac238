//! Interaction extraction strategies
//!
//! Each strategy is a stateless policy that converts a cleaned message
//! list (plus optional feedback) into zero or more training interactions.
//! Strategies only decide *which* parts of a conversation become the
//! (input, output) pair; validation and cleaning happen upstream in
//! `extractor`.
//!
//! Available strategies:
//! - `last_turn`: only the most recent complete user/assistant exchange
//! - `full_history`: first user input, everything after it as output
//! - `last_n_turns` / `first_n_turns`: windowed slices with role-labeled context
//! - `context_window`: last N turns, user messages concatenated as input
//! - `sliding_window`: many overlapping windows from one conversation
//! - `summary_context`: compress earlier turns into a short summary
//! - `key_turns`: pick semantically relevant turns via text similarity

mod context_window;
mod first_n_turns;
mod full_history;
mod key_turns;
mod last_n_turns;
mod last_turn;
mod sliding_window;
mod summary_context;

pub use context_window::ContextWindowStrategy;
pub use first_n_turns::FirstNTurnsStrategy;
pub use full_history::FullHistoryStrategy;
pub use key_turns::KeyTurnsStrategy;
pub use last_n_turns::LastNTurnsStrategy;
pub use last_turn::LastTurnStrategy;
pub use sliding_window::SlidingWindowStrategy;
pub use summary_context::SummaryContextStrategy;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::models::{FeedbackSignal, Interaction, Message, Turn};

/// Default turn count for windowed strategies.
pub const DEFAULT_N_TURNS: usize = 3;

/// A policy for extracting training interactions from a conversation.
///
/// Implementations are pure: no I/O, no shared mutable state, and the
/// same input always yields the same output. `extract` returns at most
/// one interaction; `extract_all` may return many (sliding windows) and
/// defaults to wrapping `extract` for single-result strategies.
pub trait ExtractionStrategy: Send + Sync {
    /// Strategy name for logging and factory lookup.
    fn name(&self) -> &'static str;

    /// Extract one interaction from cleaned messages, or None if the
    /// conversation has no complete turn to work with.
    fn extract(
        &self,
        task_id: Uuid,
        messages: &[Message],
        feedback: &FeedbackSignal,
    ) -> Option<Interaction>;

    /// Extract every interaction this strategy can produce.
    fn extract_all(
        &self,
        task_id: Uuid,
        messages: &[Message],
        feedback: &FeedbackSignal,
    ) -> Vec<Interaction> {
        self.extract(task_id, messages, feedback)
            .into_iter()
            .collect()
    }
}

/// True for roles that count as the agent side of a turn.
///
/// Matching is case-insensitive; "assistant" and "agent" are synonyms.
pub(crate) fn is_agent_role(role: &str) -> bool {
    role.eq_ignore_ascii_case("assistant") || role.eq_ignore_ascii_case("agent")
}

pub(crate) fn is_user_role(role: &str) -> bool {
    role.eq_ignore_ascii_case("user")
}

/// Group a cleaned message sequence into ordered (user, agent) turns.
///
/// Scans forward: each user message is paired with the next assistant or
/// agent message. If another user message appears first, the unanswered
/// one is dropped. Messages with other roles are inert - they are
/// skipped and do not break a pending search.
pub fn parse_turns(messages: &[Message]) -> Vec<Turn> {
    let mut turns = Vec::new();
    let mut i = 0;

    while i < messages.len() {
        if !is_user_role(&messages[i].role) {
            i += 1;
            continue;
        }

        let user_content = &messages[i].content;
        let mut paired = None;
        for (j, next) in messages.iter().enumerate().skip(i + 1) {
            if is_agent_role(&next.role) {
                paired = Some((j, &next.content));
                break;
            }
            if is_user_role(&next.role) {
                // No response arrived for this user message
                break;
            }
        }

        match paired {
            Some((j, agent_content)) => {
                turns.push(Turn {
                    user: user_content.clone(),
                    agent: agent_content.clone(),
                });
                i = j + 1;
            }
            None => i += 1,
        }
    }

    turns
}

/// Format turns as interleaved "User: ..." / "Assistant: ..." lines.
pub(crate) fn format_labeled_turns(turns: &[Turn]) -> String {
    let mut lines = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        lines.push(format!("User: {}", turn.user));
        lines.push(format!("Assistant: {}", turn.agent));
    }
    lines.join("\n")
}

/// Concatenate the user sides of a window of turns into one input.
///
/// Single turn: verbatim. Up to three turns: joined by a blank line.
/// Larger windows get "[Turn i]" markers so the boundaries stay legible.
pub(crate) fn concat_window_inputs(turns: &[Turn]) -> String {
    if turns.len() == 1 {
        return turns[0].user.clone();
    }

    let formatted: Vec<String> = if turns.len() <= 3 {
        turns.iter().map(|t| t.user.clone()).collect()
    } else {
        turns
            .iter()
            .enumerate()
            .map(|(i, t)| format!("[Turn {}] {}", i + 1, t.user))
            .collect()
    };

    formatted.join("\n\n")
}

/// Build a strategy from a spec string.
///
/// Simple strategies are bare names; parameterized ones take
/// colon-separated arguments:
///
/// ```text
/// last_turn
/// full_history
/// last_n:3            first_n:3
/// context_window:3
/// sliding_window:2:1:0        (window_size:stride:start_offset)
/// summary_context
/// key_turns:3:jaccard
/// ```
pub fn build_strategy(spec: &str) -> Result<Box<dyn ExtractionStrategy>> {
    let mut parts = spec.split(':');
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let parse_arg = |idx: usize, what: &str| -> Result<usize> {
        args[idx]
            .parse::<usize>()
            .with_context(|| format!("Invalid {} in strategy spec '{}'", what, spec))
    };

    match name {
        "last_turn" => Ok(Box::new(LastTurnStrategy)),
        "full_history" => Ok(Box::new(FullHistoryStrategy::default())),
        "last_n" | "last_n_turns" => {
            let n = if args.is_empty() { DEFAULT_N_TURNS } else { parse_arg(0, "turn count")? };
            Ok(Box::new(LastNTurnsStrategy::new(n)))
        }
        "first_n" | "first_n_turns" => {
            let n = if args.is_empty() { DEFAULT_N_TURNS } else { parse_arg(0, "turn count")? };
            Ok(Box::new(FirstNTurnsStrategy::new(n)))
        }
        "context_window" => {
            let n = if args.is_empty() { DEFAULT_N_TURNS } else { parse_arg(0, "turn count")? };
            Ok(Box::new(ContextWindowStrategy::new(n, None)))
        }
        "sliding_window" => {
            let window = if args.is_empty() { 2 } else { parse_arg(0, "window size")? };
            let stride = if args.len() < 2 { 1 } else { parse_arg(1, "stride")? };
            let offset = if args.len() < 3 { 0 } else { parse_arg(2, "start offset")? };
            Ok(Box::new(SlidingWindowStrategy::new(window, stride, offset)))
        }
        "summary_context" => Ok(Box::new(SummaryContextStrategy::default())),
        "key_turns" => {
            let n = if args.is_empty() { DEFAULT_N_TURNS } else { parse_arg(0, "turn count")? };
            let method = if args.len() < 2 {
                Default::default()
            } else {
                args[1].parse()?
            };
            Ok(Box::new(KeyTurnsStrategy::new(n, method)))
        }
        _ => Err(anyhow::anyhow!(
            "Unknown strategy: {}. Available: last_turn, full_history, last_n:N, first_n:N, \
             context_window:N, sliding_window:W:S:O, summary_context, key_turns:N:METHOD",
            name
        )),
    }
}
