//! The event union streamed to callers of `Orchestrator::execute` (§6.2).

use serde::Serialize;
use serde_json::Value;

use crate::run::{RunContext, StopReason};
use crate::stream::{ModelResponse, Usage};

/// The terminal outcome carried on `run.completed`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub session_id: String,
    pub state: crate::run::RunState,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub context: RunContext,
}

/// One item of the tool-result fold-back (§4.11 step 6).
#[derive(Debug, Clone, Serialize)]
pub struct ToolResultPayload {
    pub tool_call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The full event grammar emitted per run (§4.11 ordering guarantees,
/// §6.2 field table). `type` is the serde tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    #[serde(rename = "run.queued")]
    RunQueued { run_id: String, position: usize },

    #[serde(rename = "run.started")]
    RunStarted { run_id: String },

    #[serde(rename = "run.completed")]
    RunCompleted { run_id: String, result: RunResult },

    #[serde(rename = "run.error")]
    RunError { run_id: String, error: String },

    #[serde(rename = "run.cancelled")]
    RunCancelled { run_id: String, reason: String },

    #[serde(rename = "context.start")]
    ContextStart,

    #[serde(rename = "context.complete")]
    ContextComplete { context: Value },

    #[serde(rename = "model.start")]
    ModelStart,

    #[serde(rename = "model.delta")]
    ModelDelta { delta: String },

    #[serde(rename = "model.thinking")]
    ModelThinking { delta: String },

    #[serde(rename = "model.complete")]
    ModelComplete { response: ModelResponse },

    #[serde(rename = "tool.start")]
    ToolStart { tool_call_id: String, tool_name: String, arguments: Value },

    #[serde(rename = "tool.complete")]
    ToolComplete { tool_call_id: String, result: ToolResultPayload },

    #[serde(rename = "tool.error")]
    ToolError { tool_call_id: String, error: String },
}

impl AgentEvent {
    /// Whether this event is one of the three possible terminal events
    /// for a run (§3 AgentEvent invariant, §4.11 ordering guarantees).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::RunCompleted { .. } | AgentEvent::RunError { .. } | AgentEvent::RunCancelled { .. }
        )
    }
}
