//! Provider-agnostic streaming types returned by a [`crate::ModelAdapter`].

use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::message::ToolCall;

/// A boxed async stream, used for model streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The finished-response payload carried by [`ModelChunk::Response`].
#[derive(Debug, Clone, Serialize)]
pub struct ModelResponse {
    pub id: String,
    pub content: String,
    pub finish_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// One chunk of a [`crate::ModelAdapter::stream`] sequence (§6.4).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ModelChunk {
    /// Incremental assistant text.
    #[serde(rename = "content")]
    Content { delta: String },
    /// Incremental reasoning/thinking text.
    #[serde(rename = "thinking")]
    Thinking { delta: String },
    /// The terminal chunk of the stream — carries the full response.
    #[serde(rename = "response")]
    Response(ModelResponse),
}
