//! Component 12: the token estimator (§4.12). A heuristic
//! character-to-token ratio keyed by script class, used everywhere a
//! budget decision is needed (composer, truncator, compaction detector).
//! A caller with an exact tokenizer can swap in their own `TokenEstimator`
//! — every downstream component is written against the trait, not this
//! heuristic.

use sa_domain::{ContentPart, Message, MessageContent, ToolDefinition};

const IMAGE_SMALL_BYTES: usize = 10 * 1024;
const IMAGE_MEDIUM_BYTES: usize = 50 * 1024;

enum Script {
    Other,
    Cyrillic,
    Cjk,
}

fn classify(c: char) -> Script {
    match c as u32 {
        0x0400..=0x04FF => Script::Cyrillic,
        0x3040..=0x30FF | 0x4E00..=0x9FFF | 0xAC00..=0xD7A3 => Script::Cjk,
        _ => Script::Other,
    }
}

/// Estimate a raw string by counting characters per script class and
/// applying that class's chars-per-token ratio.
pub fn estimate_text(text: &str) -> u32 {
    let (mut other, mut cyrillic, mut cjk) = (0u32, 0u32, 0u32);
    for c in text.chars() {
        match classify(c) {
            Script::Other => other += 1,
            Script::Cyrillic => cyrillic += 1,
            Script::Cjk => cjk += 1,
        }
    }
    let tokens = other as f64 / 4.0 + cyrillic as f64 / 2.5 + cjk as f64 / 1.5;
    tokens.ceil() as u32
}

/// Fixed token bands for image content, keyed by raw data size.
pub fn estimate_image(data_len: usize) -> u32 {
    if data_len <= IMAGE_SMALL_BYTES {
        85
    } else if data_len <= IMAGE_MEDIUM_BYTES {
        170
    } else {
        255
    }
}

fn estimate_part(part: &ContentPart) -> u32 {
    match part {
        ContentPart::Text { text } => estimate_text(text),
        ContentPart::ToolUse { name, input, .. } => estimate_text(name) + estimate_text(&input.to_string()) + 5,
        ContentPart::ToolResult { content, .. } => estimate_text(content) + 5,
        ContentPart::Image { data_len, .. } => estimate_image(*data_len),
    }
}

pub fn estimate_content(content: &MessageContent) -> u32 {
    match content {
        MessageContent::Text(text) => estimate_text(text),
        MessageContent::Parts(parts) => parts.iter().map(estimate_part).sum(),
    }
}

/// 1 (role) + content + 4 (overhead).
pub fn estimate_message(message: &Message) -> u32 {
    1 + estimate_content(&message.content) + 4
}

/// content + 10.
pub fn estimate_system_prompt(prompt: &str) -> u32 {
    estimate_text(prompt) + 10
}

/// Σ per-tool (name + description + serialized parameters), +20 flat if
/// the tool list is non-empty.
pub fn estimate_tools(tools: &[ToolDefinition]) -> u32 {
    if tools.is_empty() {
        return 0;
    }
    let sum: u32 = tools
        .iter()
        .map(|t| estimate_text(&t.name) + estimate_text(&t.description) + estimate_text(&t.parameters.to_string()))
        .sum();
    sum + 20
}

/// Substitutable estimator interface — the heuristic functions above are
/// the default; a caller wired to a real tokenizer implements this trait
/// instead and the rest of the pipeline is none the wiser.
pub trait TokenEstimator: Send + Sync {
    fn estimate_text(&self, text: &str) -> u32;
    fn estimate_message(&self, message: &Message) -> u32;
    fn estimate_system_prompt(&self, prompt: &str) -> u32;
    fn estimate_tools(&self, tools: &[ToolDefinition]) -> u32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate_text(&self, text: &str) -> u32 {
        estimate_text(text)
    }

    fn estimate_message(&self, message: &Message) -> u32 {
        estimate_message(message)
    }

    fn estimate_system_prompt(&self, prompt: &str) -> u32 {
        estimate_system_prompt(prompt)
    }

    fn estimate_tools(&self, tools: &[ToolDefinition]) -> u32 {
        estimate_tools(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::Role;
    use serde_json::json;

    #[test]
    fn latin_text_is_about_one_token_per_four_chars() {
        assert_eq!(estimate_text("abcd"), 1);
        assert_eq!(estimate_text("abcdefgh"), 2);
    }

    #[test]
    fn cjk_text_uses_the_denser_ratio() {
        // 3 CJK chars / 1.5 = 2, exactly.
        assert_eq!(estimate_text("\u{4e2d}\u{6587}\u{5b57}"), 2);
    }

    #[test]
    fn image_bands_step_at_the_documented_sizes() {
        assert_eq!(estimate_image(1024), 85);
        assert_eq!(estimate_image(20_000), 170);
        assert_eq!(estimate_image(200_000), 255);
    }

    #[test]
    fn empty_tool_list_costs_nothing() {
        assert_eq!(estimate_tools(&[]), 0);
    }

    #[test]
    fn message_overhead_is_five_tokens_on_top_of_content() {
        let message = Message { role: Role::User, content: MessageContent::Text("abcd".into()) };
        assert_eq!(estimate_message(&message), 1 + 1 + 4);
    }

    #[test]
    fn tool_use_part_counts_name_and_arguments_plus_overhead() {
        let part = ContentPart::ToolUse { id: "t1".into(), name: "abcd".into(), input: json!({}) };
        // "abcd" -> 1 token, `{}` -> 1 token, +5 overhead.
        assert_eq!(estimate_part(&part), 1 + 1 + 5);
    }

    #[test]
    fn heuristic_estimator_delegates_to_free_functions() {
        let estimator = HeuristicEstimator;
        assert_eq!(estimator.estimate_text("abcd"), estimate_text("abcd"));
    }
}
