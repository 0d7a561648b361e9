//! Shared vocabulary for the agent run orchestration workspace: error
//! types, message/tool shapes, run/event data, configuration, and the
//! collaborator traits (`ModelAdapter`, `SessionStore`, `ToolExecutor`)
//! that `sa-orchestrator` drives without depending on any concrete
//! implementation crate.

pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod run;
pub mod stream;
pub mod traits;

pub use cancel::CancelSignal;
pub use config::Config;
pub use error::{Error, Result};
pub use event::{AgentEvent, RunResult, ToolResultPayload};
pub use message::{ContentPart, Message, MessageContent, Role, SessionMessage, SessionMessageKind, ToolCall, ToolDefinition};
pub use run::{Run, RunContext, RunState, StopReason, TurnCounters};
pub use stream::{BoxStream, ModelChunk, ModelResponse, Usage};
pub use traits::{
    AssembleOptions, AssembledContext, ChatParams, CompactionCheck, ContextAssembler, ExecCtx, ModelAdapter,
    ModelParameters, SessionStore, ToolExecutor, ToolOutcome,
};
