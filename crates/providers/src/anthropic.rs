//! Anthropic Messages API adapter — the one concrete `ModelAdapter`
//! implementation (§2.1, §6.4). Same request-building and SSE
//! content-block-assembly shape as a typical `chat`/`chat_stream`
//! provider surface, narrowed down to the single `stream` method the
//! orchestrator's contract needs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use sa_domain::message::{ContentPart, Message, MessageContent, Role, ToolDefinition};
use sa_domain::stream::{BoxStream, ModelChunk, ModelResponse, Usage};
use sa_domain::{ChatParams, Error, ModelAdapter, Result, ToolCall};

use crate::util::from_reqwest;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Talks to the Anthropic Messages API (`POST /v1/messages`, `stream: true`).
pub struct AnthropicAdapter {
    base_url: String,
    api_key: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url("https://api.anthropic.com".to_string(), api_key)
    }

    pub fn with_base_url(base_url: String, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds with a static timeout config");
        Self { base_url: base_url.trim_end_matches('/').to_string(), api_key: api_key.into(), max_tokens: DEFAULT_MAX_TOKENS, client }
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url).header("x-api-key", &self.api_key).header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn build_body(&self, params: &ChatParams) -> Value {
        let mut api_messages: Vec<Value> = Vec::new();
        for msg in &params.messages {
            match msg.role {
                Role::System => {} // carried separately below
                Role::User => api_messages.push(user_message_to_anthropic(msg)),
                Role::Assistant => api_messages.push(assistant_message_to_anthropic(msg)),
                Role::Tool => api_messages.push(tool_result_to_anthropic(msg)),
            }
        }

        let max_tokens = params.parameters.max_tokens.unwrap_or(self.max_tokens);
        let mut body = serde_json::json!({
            "model": params.model,
            "messages": api_messages,
            "max_tokens": max_tokens,
            "stream": true,
        });

        if !params.system_prompt.is_empty() {
            body["system"] = Value::String(params.system_prompt.clone());
        }
        if !params.tools.is_empty() {
            body["tools"] = Value::Array(params.tools.iter().map(tool_to_anthropic).collect());
        }
        if let Some(temperature) = params.parameters.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(top_p) = params.parameters.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(top_k) = params.parameters.top_k {
            body["top_k"] = serde_json::json!(top_k);
        }
        if let Some(thinking_budget) = params.parameters.thinking_budget {
            body["thinking"] = serde_json::json!({ "type": "enabled", "budget_tokens": thinking_budget });
        }

        body
    }
}

fn user_message_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({ "role": "user", "content": t }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
                    _ => None,
                })
                .collect();
            serde_json::json!({ "role": "user", "content": content })
        }
    }
}

fn assistant_message_to_anthropic(msg: &Message) -> Value {
    let content: Vec<Value> = match &msg.content {
        MessageContent::Text(t) => vec![serde_json::json!({ "type": "text", "text": t })],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
                ContentPart::ToolUse { id, name, input } => {
                    Some(serde_json::json!({ "type": "tool_use", "id": id, "name": name, "input": input }))
                }
                _ => None,
            })
            .collect(),
    };
    serde_json::json!({ "role": "assistant", "content": content })
}

fn tool_result_to_anthropic(msg: &Message) -> Value {
    let content: Vec<Value> = match &msg.content {
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult { tool_use_id, content, is_error } => {
                    Some(serde_json::json!({ "type": "tool_result", "tool_use_id": tool_use_id, "content": content, "is_error": is_error }))
                }
                _ => None,
            })
            .collect(),
        MessageContent::Text(t) => vec![serde_json::json!({ "type": "tool_result", "tool_use_id": "", "content": t })],
    };
    serde_json::json!({ "role": "user", "content": content })
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({ "name": tool.name, "description": tool.description, "input_schema": tool.parameters })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
    Some(Usage { prompt_tokens: input, completion_tokens: output, total_tokens: input + output })
}

fn normalize_stop_reason(s: &str) -> String {
    match s {
        "end_turn" => "stop".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    }
}

/// State threaded across SSE payloads to assemble streamed tool-call
/// arguments and the final response (§6.4 `response` chunk carries the
/// full `toolCalls?`).
struct StreamState {
    text: String,
    tool_calls: HashMap<u64, (String, String, String)>,
    usage: Option<Usage>,
    stop_reason: Option<String>,
    response_id: String,
}

impl StreamState {
    fn new() -> Self {
        Self { text: String::new(), tool_calls: HashMap::new(), usage: None, stop_reason: None, response_id: String::new() }
    }

    fn into_response(self) -> ModelResponse {
        let mut ordered: Vec<_> = self.tool_calls.into_iter().collect();
        ordered.sort_by_key(|(idx, _)| *idx);
        let tool_calls = ordered
            .into_iter()
            .map(|(_, (id, name, args))| ToolCall {
                id,
                name,
                arguments: serde_json::from_str(&args).unwrap_or(Value::Object(Default::default())),
            })
            .collect();

        ModelResponse {
            id: self.response_id,
            content: self.text,
            finish_reason: self.stop_reason.unwrap_or_else(|| "stop".to_string()),
            usage: self.usage,
            tool_calls,
        }
    }
}

/// Parse one Anthropic SSE payload, mutating `state` and emitting
/// zero or more [`ModelChunk`]s. The terminal [`ModelChunk::Response`]
/// is emitted once on `message_stop`.
fn parse_sse_payload(data: &str, state: &mut StreamState) -> Vec<ModelChunk> {
    let mut chunks = Vec::new();
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "malformed anthropic SSE payload");
            return chunks;
        }
    };

    match v.get("type").and_then(Value::as_str).unwrap_or("") {
        "message_start" => {
            if let Some(msg) = v.get("message") {
                state.response_id = msg.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                state.usage = msg.get("usage").and_then(parse_usage);
            }
        }
        "content_block_start" => {
            let idx = v.get("index").and_then(Value::as_u64).unwrap_or(0);
            if let Some(block) = v.get("content_block") {
                if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                    let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    state.tool_calls.insert(idx, (id, name, String::new()));
                }
            }
        }
        "content_block_delta" => {
            let idx = v.get("index").and_then(Value::as_u64).unwrap_or(0);
            if let Some(delta) = v.get("delta") {
                match delta.get("type").and_then(Value::as_str).unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta.get("text").and_then(Value::as_str) {
                            state.text.push_str(text);
                            chunks.push(ModelChunk::Content { delta: text.to_string() });
                        }
                    }
                    "thinking_delta" => {
                        if let Some(text) = delta.get("thinking").and_then(Value::as_str) {
                            chunks.push(ModelChunk::Thinking { delta: text.to_string() });
                        }
                    }
                    "input_json_delta" => {
                        if let Some(partial) = delta.get("partial_json").and_then(Value::as_str) {
                            if let Some(tc) = state.tool_calls.get_mut(&idx) {
                                tc.2.push_str(partial);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "message_delta" => {
            if let Some(output) = v.get("usage").and_then(|u| u.get("output_tokens")).and_then(Value::as_u64) {
                if let Some(ref mut usage) = state.usage {
                    usage.completion_tokens = output as u32;
                    usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
                }
            }
            if let Some(reason) = v.get("delta").and_then(|d| d.get("stop_reason")).and_then(Value::as_str) {
                state.stop_reason = Some(normalize_stop_reason(reason));
            }
        }
        "message_stop" => {
            let response = std::mem::replace(state, StreamState::new()).into_response();
            chunks.push(ModelChunk::Response(response));
        }
        "error" => {
            let msg = v.get("error").and_then(|e| e.get("message")).and_then(Value::as_str).unwrap_or("unknown error");
            tracing::warn!(error = msg, "anthropic stream error event");
        }
        _ => {}
    }

    chunks
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    async fn stream(&self, params: ChatParams) -> Result<BoxStream<'static, ModelChunk>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(&params);

        tracing::debug!(model = %params.model, url = %url, "anthropic stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider { provider: "anthropic".into(), message: format!("HTTP {} - {text}", status.as_u16()) });
        }

        let mut state = StreamState::new();
        Ok(crate::sse::sse_response_stream(resp, move |data| parse_sse_payload(data, &mut state)))
    }
}

/// A `ModelAdapter` that answers with a fixed script of chunks per call,
/// for tests and the demonstration binary's `--offline` mode. Grounded
/// on the orchestrator's own test doubles (`runner.rs`'s `OneShotModel`).
pub struct MockModelAdapter {
    script: Arc<dyn Fn(&ChatParams) -> Vec<ModelChunk> + Send + Sync>,
}

impl MockModelAdapter {
    /// Always answers with the same fixed text, no tool calls.
    pub fn fixed_reply(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            script: Arc::new(move |_params| {
                vec![
                    ModelChunk::Content { delta: text.clone() },
                    ModelChunk::Response(ModelResponse {
                        id: "mock".into(),
                        content: text.clone(),
                        finish_reason: "stop".into(),
                        usage: Some(Usage { prompt_tokens: 0, completion_tokens: 0, total_tokens: 0 }),
                        tool_calls: vec![],
                    }),
                ]
            }),
        }
    }

    /// Echoes the last user message back, prefixed, useful for an
    /// interactive demo loop that doesn't need a real API key.
    pub fn echo() -> Self {
        Self {
            script: Arc::new(|params| {
                let last_user = params
                    .messages
                    .iter()
                    .rev()
                    .find(|m| matches!(m.role, Role::User))
                    .map(|m| m.content.extract_all_text())
                    .unwrap_or_default();
                let reply = format!("you said: {last_user}");
                vec![
                    ModelChunk::Content { delta: reply.clone() },
                    ModelChunk::Response(ModelResponse {
                        id: "echo".into(),
                        content: reply,
                        finish_reason: "stop".into(),
                        usage: None,
                        tool_calls: vec![],
                    }),
                ]
            }),
        }
    }

    /// Builds an adapter from an arbitrary per-call script, for tests
    /// that need tool calls or multi-turn behavior.
    pub fn scripted(script: impl Fn(&ChatParams) -> Vec<ModelChunk> + Send + Sync + 'static) -> Self {
        Self { script: Arc::new(script) }
    }
}

#[async_trait]
impl ModelAdapter for MockModelAdapter {
    async fn stream(&self, params: ChatParams) -> Result<BoxStream<'static, ModelChunk>> {
        let chunks = (self.script)(&params);
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_message_stream_into_content_then_response() {
        let mut state = StreamState::new();
        let payloads = [
            r#"{"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":10,"output_tokens":0}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" there"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":5}}"#,
            r#"{"type":"message_stop"}"#,
        ];

        let mut all_chunks = Vec::new();
        for p in payloads {
            all_chunks.extend(parse_sse_payload(p, &mut state));
        }

        assert!(matches!(&all_chunks[0], ModelChunk::Content { delta } if delta == "hi"));
        match all_chunks.last().unwrap() {
            ModelChunk::Response(resp) => {
                assert_eq!(resp.content, "hi there");
                assert_eq!(resp.finish_reason, "stop");
                assert_eq!(resp.id, "msg_1");
                let usage = resp.usage.unwrap();
                assert_eq!(usage.prompt_tokens, 10);
                assert_eq!(usage.completion_tokens, 5);
            }
            other => panic!("expected Response chunk, got {other:?}"),
        }
    }

    #[test]
    fn assembles_a_streamed_tool_call_from_input_json_deltas() {
        let mut state = StreamState::new();
        let payloads = [
            r#"{"type":"message_start","message":{"id":"msg_2","usage":{"input_tokens":5,"output_tokens":0}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"call_1","name":"add"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"a\":1,"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"\"b\":2}"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":3}}"#,
            r#"{"type":"message_stop"}"#,
        ];

        let mut all_chunks = Vec::new();
        for p in payloads {
            all_chunks.extend(parse_sse_payload(p, &mut state));
        }

        match all_chunks.last().unwrap() {
            ModelChunk::Response(resp) => {
                assert_eq!(resp.finish_reason, "tool_calls");
                assert_eq!(resp.tool_calls.len(), 1);
                assert_eq!(resp.tool_calls[0].name, "add");
                assert_eq!(resp.tool_calls[0].arguments, serde_json::json!({"a": 1, "b": 2}));
            }
            other => panic!("expected Response chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mock_adapter_fixed_reply_streams_content_then_response() {
        let adapter = MockModelAdapter::fixed_reply("hello");
        let params = ChatParams {
            model: "mock".into(),
            system_prompt: String::new(),
            messages: vec![],
            tools: vec![],
            parameters: Default::default(),
        };
        let mut stream = adapter.stream(params).await.unwrap();
        let mut saw_content = false;
        while let Some(chunk) = stream.next().await {
            if let ModelChunk::Response(resp) = &chunk {
                assert_eq!(resp.content, "hello");
            }
            if matches!(chunk, ModelChunk::Content { .. }) {
                saw_content = true;
            }
        }
        assert!(saw_content);
    }

    #[tokio::test]
    async fn mock_adapter_echo_reflects_the_last_user_message() {
        let adapter = MockModelAdapter::echo();
        let params = ChatParams {
            model: "mock".into(),
            system_prompt: String::new(),
            messages: vec![Message::user("ping")],
            tools: vec![],
            parameters: Default::default(),
        };
        let mut stream = adapter.stream(params).await.unwrap();
        let mut response = None;
        while let Some(chunk) = stream.next().await {
            if let ModelChunk::Response(resp) = chunk {
                response = Some(resp);
            }
        }
        assert_eq!(response.unwrap().content, "you said: ping");
    }
}
