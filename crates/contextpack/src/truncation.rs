//! Component 16: the context truncator (§4.16). Trims the transformed
//! message array down to a token budget. Three strategies:
//!
//! - `Simple` — drop the oldest message repeatedly until the budget is
//!   met, always keeping at least the newest one.
//! - `PairPreserving` ("smart") — like `Simple`, but never drops a
//!   message that is half of a tool-call/tool-result pair, and never
//!   drops down to an empty result.
//! - `Sliding` — keep a contiguous window of the most recent messages
//!   that fits the budget; anything older is dropped outright.
//!
//! This operates on a message in an array, not a workspace file on
//! disk, and the budget is a token count from the [`crate::estimator`],
//! not a character cap.

use std::collections::{HashSet, VecDeque};

use sa_domain::{ContentPart, Message, MessageContent};

use crate::estimator::TokenEstimator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationStrategy {
    Simple,
    PairPreserving,
    Sliding,
}

#[derive(Debug, Clone)]
pub struct TruncationResult {
    pub messages: Vec<Message>,
    pub removed_count: usize,
    pub removed_tokens: u32,
    pub original_tokens: u32,
    pub final_tokens: u32,
}

/// `max_tokens` minus everything else already spoken for (system prompt,
/// tools, and a fixed reserve for the model's own reply).
pub fn compute_budget(max_tokens: u32, reserve_tokens: u32, system_prompt_tokens: u32, tools_tokens: u32) -> u32 {
    max_tokens.saturating_sub(reserve_tokens).saturating_sub(system_prompt_tokens).saturating_sub(tools_tokens)
}

pub fn truncate(messages: &[Message], strategy: TruncationStrategy, budget: u32, estimator: &dyn TokenEstimator) -> TruncationResult {
    match strategy {
        TruncationStrategy::Simple => truncate_simple(messages, budget, estimator),
        TruncationStrategy::PairPreserving => truncate_pair_preserving(messages, budget, estimator),
        TruncationStrategy::Sliding => truncate_sliding(messages, budget, estimator),
    }
}

fn per_message_tokens(messages: &[Message], estimator: &dyn TokenEstimator) -> Vec<u32> {
    messages.iter().map(|m| estimator.estimate_message(m)).collect()
}

pub fn truncate_simple(messages: &[Message], budget: u32, estimator: &dyn TokenEstimator) -> TruncationResult {
    let per_msg = per_message_tokens(messages, estimator);
    let original_tokens: u32 = per_msg.iter().sum();

    let mut keep: VecDeque<usize> = (0..messages.len()).collect();
    let mut total = original_tokens;
    while total > budget && keep.len() > 1 {
        let dropped = keep.pop_front().expect("keep is non-empty");
        total -= per_msg[dropped];
    }

    finish(messages, keep.into_iter().collect(), original_tokens, total)
}

fn compute_pair_membership(messages: &[Message]) -> Vec<bool> {
    let mut tool_use_ids: HashSet<&str> = HashSet::new();
    let mut tool_result_ids: HashSet<&str> = HashSet::new();
    for message in messages {
        if let MessageContent::Parts(parts) = &message.content {
            for part in parts {
                match part {
                    ContentPart::ToolUse { id, .. } => {
                        tool_use_ids.insert(id.as_str());
                    }
                    ContentPart::ToolResult { tool_use_id, .. } => {
                        tool_result_ids.insert(tool_use_id.as_str());
                    }
                    _ => {}
                }
            }
        }
    }
    let paired: HashSet<&str> = tool_use_ids.intersection(&tool_result_ids).copied().collect();

    messages
        .iter()
        .map(|message| match &message.content {
            MessageContent::Parts(parts) => parts.iter().any(|part| match part {
                ContentPart::ToolUse { id, .. } => paired.contains(id.as_str()),
                ContentPart::ToolResult { tool_use_id, .. } => paired.contains(tool_use_id.as_str()),
                _ => false,
            }),
            MessageContent::Text(_) => false,
        })
        .collect()
}

pub fn truncate_pair_preserving(messages: &[Message], budget: u32, estimator: &dyn TokenEstimator) -> TruncationResult {
    let per_msg = per_message_tokens(messages, estimator);
    let original_tokens: u32 = per_msg.iter().sum();
    let pair_member = compute_pair_membership(messages);

    // Walk newest-to-oldest so ties favor keeping the most recent user
    // turn, mirroring `truncate_sliding`. Pair members are always kept —
    // dropping one half of a tool-call/result pair is never on the
    // table — everything else is dropped oldest-first once it would push
    // the running total over budget.
    let mut kept_rev: Vec<usize> = Vec::new();
    let mut total = 0u32;
    for i in (0..messages.len()).rev() {
        let tokens = per_msg[i];
        if pair_member[i] || total + tokens <= budget || kept_rev.is_empty() {
            total += tokens;
            kept_rev.push(i);
        }
    }
    kept_rev.reverse();

    finish(messages, kept_rev, original_tokens, total)
}

pub fn truncate_sliding(messages: &[Message], budget: u32, estimator: &dyn TokenEstimator) -> TruncationResult {
    let per_msg = per_message_tokens(messages, estimator);
    let original_tokens: u32 = per_msg.iter().sum();

    let mut kept_rev: Vec<usize> = Vec::new();
    let mut total = 0u32;
    for i in (0..messages.len()).rev() {
        if total + per_msg[i] <= budget {
            total += per_msg[i];
            kept_rev.push(i);
        } else {
            break;
        }
    }
    kept_rev.reverse();

    finish(messages, kept_rev, original_tokens, total)
}

fn finish(messages: &[Message], kept_indices: Vec<usize>, original_tokens: u32, final_tokens: u32) -> TruncationResult {
    let kept: Vec<Message> = kept_indices.iter().map(|&i| messages[i].clone()).collect();
    TruncationResult {
        removed_count: messages.len() - kept.len(),
        removed_tokens: original_tokens.saturating_sub(final_tokens),
        original_tokens,
        final_tokens,
        messages: kept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::HeuristicEstimator;
    use sa_domain::Role;

    fn msg(role: Role, text: &str) -> Message {
        Message { role, content: MessageContent::Text(text.into()) }
    }

    #[test]
    fn simple_strategy_drops_oldest_first() {
        let messages = vec![msg(Role::User, "aaaaaaaaaaaaaaaa"), msg(Role::Assistant, "bbbbbbbbbbbbbbbb"), msg(Role::User, "c")];
        let estimator = HeuristicEstimator;
        let result = truncate_simple(&messages, 10, &estimator);
        assert!(result.messages.len() < messages.len());
        assert_eq!(result.messages.last().unwrap().content.extract_all_text(), "c");
    }

    #[test]
    fn simple_strategy_always_keeps_at_least_one_message() {
        let messages = vec![msg(Role::User, "a very very very long message indeed")];
        let estimator = HeuristicEstimator;
        let result = truncate_simple(&messages, 1, &estimator);
        assert_eq!(result.messages.len(), 1);
    }

    #[test]
    fn pair_preserving_never_splits_a_tool_call_from_its_result() {
        let messages = vec![
            msg(Role::User, "long user turn padding the budget out quite a bit"),
            Message {
                role: Role::Assistant,
                content: MessageContent::Parts(vec![ContentPart::ToolUse {
                    id: "t1".into(),
                    name: "search".into(),
                    input: serde_json::json!({"q": "rust"}),
                }]),
            },
            Message {
                role: Role::User,
                content: MessageContent::Parts(vec![ContentPart::ToolResult {
                    tool_use_id: "t1".into(),
                    content: "result".into(),
                    is_error: false,
                }]),
            },
        ];
        let estimator = HeuristicEstimator;
        let result = truncate_pair_preserving(&messages, 1, &estimator);
        let has_tool_use = result
            .messages
            .iter()
            .any(|m| matches!(&m.content, MessageContent::Parts(p) if p.iter().any(|part| matches!(part, ContentPart::ToolUse { .. }))));
        let has_tool_result = result
            .messages
            .iter()
            .any(|m| matches!(&m.content, MessageContent::Parts(p) if p.iter().any(|part| matches!(part, ContentPart::ToolResult { .. }))));
        assert_eq!(has_tool_use, has_tool_result);
    }

    #[test]
    fn pair_preserving_tie_break_keeps_the_most_recent_user_turn() {
        // [u:"hi", a:tool_use{t1}, user:tool_result{t1,"3"}, u:"what?"]
        // hi=6, tool_use=13, tool_result=11, what?=7, original=37.
        // At budget=31, dropping either "hi" or "what?" alone would fit;
        // the spec's tie-break keeps the most recent user turn, so "hi"
        // is dropped and "what?" survives.
        let messages = vec![
            msg(Role::User, "hi"),
            Message {
                role: Role::Assistant,
                content: MessageContent::Parts(vec![ContentPart::ToolUse {
                    id: "t1".into(),
                    name: "search".into(),
                    input: serde_json::json!({"q": "rust"}),
                }]),
            },
            Message {
                role: Role::User,
                content: MessageContent::Parts(vec![ContentPart::ToolResult {
                    tool_use_id: "t1".into(),
                    content: "result".into(),
                    is_error: false,
                }]),
            },
            msg(Role::User, "what?"),
        ];
        let estimator = HeuristicEstimator;
        let result = truncate_pair_preserving(&messages, 31, &estimator);
        assert_eq!(result.removed_count, 1);
        assert!(!result.messages.iter().any(|m| m.content.extract_all_text() == "hi"));
        assert!(result.messages.iter().any(|m| m.content.extract_all_text() == "what?"));
    }

    #[test]
    fn sliding_strategy_keeps_a_contiguous_recent_window() {
        let messages = vec![msg(Role::User, "first"), msg(Role::Assistant, "second"), msg(Role::User, "third")];
        let estimator = HeuristicEstimator;
        let result = truncate_sliding(&messages, 8, &estimator);
        assert_eq!(result.messages.last().unwrap().content.extract_all_text(), "third");
    }

    #[test]
    fn under_budget_nothing_is_removed() {
        let messages = vec![msg(Role::User, "hi")];
        let estimator = HeuristicEstimator;
        let result = truncate_simple(&messages, 1000, &estimator);
        assert_eq!(result.removed_count, 0);
        assert_eq!(result.final_tokens, result.original_tokens);
    }
}
