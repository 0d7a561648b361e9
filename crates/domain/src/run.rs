//! Run-level data types (§3). These are pure data — the state machine
//! that governs legal transitions between [`RunState`] values lives in
//! `sa-orchestrator` (component 1); this crate only owns the shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Legal run states (§4.1). Terminal states have no outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled | RunState::Timeout
        )
    }
}

/// Why a run stopped, carried on `run.completed` / terminal events (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Stop,
    MaxTurns,
    MaxToolRounds,
    Timeout,
    Cancelled,
    Error,
}

/// A single orchestrated execution of an agent against a session (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub session_id: String,
    pub priority: i64,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(run_id: String, session_id: String, priority: i64) -> Self {
        Self {
            run_id,
            session_id,
            priority,
            state: RunState::Pending,
            stop_reason: None,
            enqueued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// `{turns, toolRounds, maxTurns, maxToolRounds}` (§3). Monotonically
/// non-decreasing for the lifetime of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TurnCounters {
    pub turns: u32,
    pub tool_rounds: u32,
    pub max_turns: u32,
    pub max_tool_rounds: u32,
}

impl TurnCounters {
    pub fn new(max_turns: u32, max_tool_rounds: u32) -> Self {
        Self { turns: 0, tool_rounds: 0, max_turns, max_tool_rounds }
    }
}

/// Accumulated per-run metrics (§3). Built incrementally by the Runner,
/// frozen once the terminal event is emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    pub context_assembly_ms: Vec<u64>,
    pub model_call_ms: Vec<u64>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub tool_executions: u32,
    pub tool_successes: u32,
    pub tool_failures: u32,
}

impl RunContext {
    pub fn record_model_usage(&mut self, usage: crate::stream::Usage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total_tokens;
    }

    pub fn record_tool_result(&mut self, succeeded: bool) {
        self.tool_executions += 1;
        if succeeded {
            self.tool_successes += 1;
        } else {
            self.tool_failures += 1;
        }
    }
}
