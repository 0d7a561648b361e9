//! External collaborator contracts (§6.4). The orchestrator is generic
//! over these traits and never depends on `sa-sessions`, `sa-providers`,
//! or `sa-tools` directly — each of those crates implements the
//! contract it owns, and `sa-runner-cli` wires concrete instances
//! together behind `Arc<dyn Trait>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::message::{Message, SessionMessage, SessionMessageKind, ToolDefinition};
use crate::stream::BoxStream;

/// Persists and retrieves the messages that make up a session's
/// history. Append-only from the orchestrator's perspective; ordering
/// and ids are the store's responsibility.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append(
        &self,
        session_id: &str,
        kind: SessionMessageKind,
        content: crate::message::MessageContent,
        parent_id: Option<String>,
    ) -> Result<SessionMessage>;

    async fn get_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>>;

    async fn get_metadata(&self, session_id: &str) -> Result<Value>;
}

/// What `checkCompaction` reports back to the Runner (§4.12, §6.4).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompactionCheck {
    pub should_compact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Resolved model call parameters (§4.18), threaded from the Defaults
/// Resolver through `AssembledContext` into `ChatParams` so a turn's
/// temperature/topP/topK/thinkingBudget actually reach the model
/// adapter instead of being computed only to size the truncation budget.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelParameters {
    pub model_id: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
}

/// The finished product of a turn's context-assembly pass (§4.17).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssembledContext {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub parameters: ModelParameters,
    pub estimated_tokens: u32,
}

/// Options threaded into `assemble` — the caller-visible knobs from
/// the Prompt Composer / Context Truncator / Defaults Resolver chain
/// (§4.14, §4.16, §4.18).
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    pub max_tokens: Option<u32>,
    pub session_mode: Option<String>,
}

/// Builds the per-turn model context from a session's history. This
/// crate only depends on the contract; `sa-contextpack` is the
/// concrete implementation the runner binary wires in.
#[async_trait]
pub trait ContextAssembler: Send + Sync {
    async fn assemble(
        &self,
        session_id: &str,
        agent_id: &str,
        options: AssembleOptions,
    ) -> Result<AssembledContext>;

    async fn check_compaction(&self, session_id: &str, agent_id: &str) -> Result<CompactionCheck>;

    async fn invalidate_cache(&self, session_id: &str);
}

/// Parameters for a single model call (§6.4).
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub parameters: ModelParameters,
}

/// Adapts a concrete model backend to the orchestrator's streaming
/// contract. `stream` returns a lazily-polled sequence of
/// [`crate::stream::ModelChunk`]s; dropping the stream before it is
/// exhausted is how the Runner expresses upstream cancellation.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    async fn stream(&self, params: ChatParams) -> Result<BoxStream<'static, crate::stream::ModelChunk>>;
}

/// Execution-scoped handle passed into [`ToolExecutor::execute`],
/// built fresh per tool call by `create_context` (§6.4).
#[derive(Debug, Clone)]
pub struct ExecCtx {
    pub session_id: String,
    pub user_id: Option<String>,
    pub run_id: String,
    pub tool_call_id: String,
    pub permissions: Vec<String>,
    /// The current run's cancel signal (§9 — the source threads an empty
    /// runId here in one place; this contract always carries the real
    /// signal so a long-running tool can observe cancellation).
    pub signal: CancelSignal,
}

/// Outcome of a single tool invocation (§4.9, §6.4).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolOutcome {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs tools on the orchestrator's behalf. Implementations are free
/// to sandbox, rate-limit, or reject by permission; the orchestrator
/// only sees the resulting [`ToolOutcome`].
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn create_context(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        run_id: &str,
        tool_call_id: &str,
        permissions: Vec<String>,
        signal: CancelSignal,
    ) -> ExecCtx;

    async fn execute(&self, tool_name: &str, arguments: Value, ctx: &ExecCtx) -> Result<ToolOutcome>;
}
