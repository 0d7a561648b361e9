//! Component 13: the message transformer (§4.13). Turns the
//! `SessionStore`'s persisted `SessionMessage` history into the
//! `Message` array a `ModelAdapter` actually speaks: map each kind to a
//! model role, merge consecutive same-role messages, then enforce
//! strict role alternation.

use sa_domain::{ContentPart, Message, MessageContent, Role, SessionMessage, SessionMessageKind};

fn role_for_kind(kind: SessionMessageKind) -> Option<Role> {
    match kind {
        SessionMessageKind::System => Some(Role::System),
        SessionMessageKind::User => Some(Role::User),
        SessionMessageKind::Assistant | SessionMessageKind::ToolCall | SessionMessageKind::Compaction => {
            Some(Role::Assistant)
        }
        SessionMessageKind::ToolResult => Some(Role::User),
        SessionMessageKind::Unknown => None,
    }
}

/// Step 1: drop unrecognized kinds, map the rest to a model role.
fn map_roles(messages: &[SessionMessage]) -> Vec<Message> {
    messages
        .iter()
        .filter_map(|m| role_for_kind(m.kind).map(|role| Message { role, content: m.content.clone() }))
        .collect()
}

fn concat_content(a: MessageContent, b: MessageContent) -> MessageContent {
    match (a, b) {
        (MessageContent::Text(x), MessageContent::Text(y)) => {
            if x.is_empty() {
                MessageContent::Text(y)
            } else if y.is_empty() {
                MessageContent::Text(x)
            } else {
                MessageContent::Text(format!("{x}\n\n{y}"))
            }
        }
        (MessageContent::Text(x), MessageContent::Parts(mut y)) => {
            let mut parts = Vec::with_capacity(y.len() + 1);
            if !x.is_empty() {
                parts.push(ContentPart::Text { text: x });
            }
            parts.append(&mut y);
            MessageContent::Parts(parts)
        }
        (MessageContent::Parts(mut x), MessageContent::Text(y)) => {
            if !y.is_empty() {
                x.push(ContentPart::Text { text: y });
            }
            MessageContent::Parts(x)
        }
        (MessageContent::Parts(mut x), MessageContent::Parts(mut y)) => {
            x.append(&mut y);
            MessageContent::Parts(x)
        }
    }
}

/// Step 2: fold consecutive same-role messages into one.
fn merge_consecutive(messages: Vec<Message>) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        match merged.last_mut() {
            Some(prev) if prev.role == message.role => {
                let prev_content = std::mem::replace(&mut prev.content, MessageContent::Text(String::new()));
                prev.content = concat_content(prev_content, message.content);
            }
            _ => merged.push(message),
        }
    }
    merged
}

/// Step 3: defensive pass enforcing strict role alternation. A no-op
/// after `merge_consecutive`, but kept distinct to match the documented
/// pipeline and to guard against a future merge rule that isn't total.
fn enforce_alternation(messages: Vec<Message>) -> Vec<Message> {
    merge_consecutive(messages)
}

/// The full pipeline: map → merge → enforce alternation.
pub fn transform(messages: &[SessionMessage]) -> Vec<Message> {
    enforce_alternation(merge_consecutive(map_roles(messages)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, kind: SessionMessageKind, text: &str) -> SessionMessage {
        SessionMessage { id: id.into(), kind, content: MessageContent::Text(text.into()), parent_id: None }
    }

    #[test]
    fn unknown_kind_is_dropped() {
        let out = transform(&[session("m1", SessionMessageKind::Unknown, "noise")]);
        assert!(out.is_empty());
    }

    #[test]
    fn consecutive_user_messages_merge_into_one() {
        let out = transform(&[
            session("m1", SessionMessageKind::User, "first"),
            session("m2", SessionMessageKind::User, "second"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content.extract_all_text(), "first\n\nsecond");
    }

    #[test]
    fn tool_call_and_tool_result_both_map_onto_assistant_and_user() {
        let out = transform(&[
            session("m1", SessionMessageKind::User, "do it"),
            SessionMessage {
                id: "m2".into(),
                kind: SessionMessageKind::ToolCall,
                content: MessageContent::Parts(vec![ContentPart::ToolUse {
                    id: "t1".into(),
                    name: "exec".into(),
                    input: serde_json::json!({}),
                }]),
                parent_id: None,
            },
            SessionMessage {
                id: "m3".into(),
                kind: SessionMessageKind::ToolResult,
                content: MessageContent::Parts(vec![ContentPart::ToolResult {
                    tool_use_id: "t1".into(),
                    content: "ok".into(),
                    is_error: false,
                }]),
                parent_id: None,
            },
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, Role::User);
        assert_eq!(out[1].role, Role::Assistant);
        assert_eq!(out[2].role, Role::User);
    }

    #[test]
    fn already_alternating_messages_pass_through_unchanged() {
        let out = transform(&[
            session("m1", SessionMessageKind::User, "hi"),
            session("m2", SessionMessageKind::Assistant, "hello"),
            session("m3", SessionMessageKind::User, "bye"),
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, Role::User);
        assert_eq!(out[1].role, Role::Assistant);
        assert_eq!(out[2].role, Role::User);
    }
}
