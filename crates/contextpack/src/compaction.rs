//! Component 17: the compaction detector (§4.17). Decides whether a
//! session's history should be compacted before the next run, checking
//! reasons in priority order: explicit request, then token budget, then
//! message count, then tool-call count.

use sa_domain::CompactionCheck;

#[derive(Debug, Clone, Copy)]
pub struct CompactionInput {
    pub message_count: u32,
    pub tool_call_count: u32,
    pub current_tokens: u32,
    pub max_context_tokens: u32,
    pub explicit: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CompactionThresholds {
    /// Fraction of `max_context_tokens` that triggers compaction.
    pub token_ratio: f64,
    pub message_count: u32,
    pub tool_count: u32,
}

impl Default for CompactionThresholds {
    fn default() -> Self {
        Self { token_ratio: 0.8, message_count: 100, tool_count: 50 }
    }
}

pub fn detect(input: &CompactionInput, thresholds: &CompactionThresholds) -> CompactionCheck {
    if input.explicit {
        return CompactionCheck { should_compact: true, reason: Some("explicit".into()) };
    }
    if input.max_context_tokens > 0 && input.current_tokens as f64 >= thresholds.token_ratio * input.max_context_tokens as f64 {
        return CompactionCheck { should_compact: true, reason: Some("token_limit".into()) };
    }
    if input.message_count >= thresholds.message_count {
        return CompactionCheck { should_compact: true, reason: Some("message_count".into()) };
    }
    if input.tool_call_count >= thresholds.tool_count {
        return CompactionCheck { should_compact: true, reason: Some("tool_count".into()) };
    }
    CompactionCheck { should_compact: false, reason: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CompactionInput {
        CompactionInput { message_count: 0, tool_call_count: 0, current_tokens: 0, max_context_tokens: 10_000, explicit: false }
    }

    #[test]
    fn nothing_triggers_below_every_threshold() {
        let check = detect(&base(), &CompactionThresholds::default());
        assert!(!check.should_compact);
    }

    #[test]
    fn explicit_wins_over_everything_else() {
        let input = CompactionInput { explicit: true, ..base() };
        let check = detect(&input, &CompactionThresholds::default());
        assert_eq!(check.reason.as_deref(), Some("explicit"));
    }

    #[test]
    fn token_limit_outranks_message_count() {
        let input = CompactionInput { current_tokens: 9000, message_count: 200, ..base() };
        let check = detect(&input, &CompactionThresholds::default());
        assert_eq!(check.reason.as_deref(), Some("token_limit"));
    }

    #[test]
    fn message_count_outranks_tool_count() {
        let input = CompactionInput { message_count: 150, tool_call_count: 100, ..base() };
        let check = detect(&input, &CompactionThresholds::default());
        assert_eq!(check.reason.as_deref(), Some("message_count"));
    }

    #[test]
    fn tool_count_triggers_on_its_own() {
        let input = CompactionInput { tool_call_count: 60, ..base() };
        let check = detect(&input, &CompactionThresholds::default());
        assert_eq!(check.reason.as_deref(), Some("tool_count"));
    }
}
