//! Component 9: the tool-call parser/validator (§4.9). The
//! `ModelAdapter` contract already hands back structured `ToolCall`
//! entries (§6.4 "the `response` chunk carries ... `toolCalls?`"), so
//! "extraction" is just reading that field; this module's job is the
//! validation pass required before a tool round runs.

use std::collections::HashSet;

use sa_domain::{Error, ModelResponse, Result, ToolCall};

/// Pull the tool calls out of a finished model response. Empty if the
/// model didn't request any.
pub fn extract(response: &ModelResponse) -> Vec<ToolCall> {
    response.tool_calls.clone()
}

/// Validate a turn's extracted tool calls: non-empty `id`, non-empty
/// `name`, `arguments` must be a JSON object, and no duplicate `id`
/// within the same response. The first violation aborts validation.
pub fn validate(tool_calls: &[ToolCall]) -> Result<()> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for call in tool_calls {
        if call.id.is_empty() {
            return Err(Error::InvalidRequest("tool call missing id".into()));
        }
        if call.name.is_empty() {
            return Err(Error::InvalidRequest(format!("tool call {} missing name", call.id)));
        }
        if !call.arguments.is_object() {
            return Err(Error::InvalidRequest(format!("tool call {} arguments must be a mapping", call.id)));
        }
        if !seen_ids.insert(call.id.as_str()) {
            return Err(Error::InvalidRequest(format!("duplicate tool call id {}", call.id)));
        }
    }
    Ok(())
}
