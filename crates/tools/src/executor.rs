//! The `ToolExecutor` collaborator contract (§4.9, §6.4), wired to the
//! built-in `exec`/`process` tool pair.
//!
//! Wraps both tools behind the single contract the orchestrator drives,
//! name-matching on `tool_name` the way a small built-in registry
//! naturally would.

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::cancel::CancelSignal;
use sa_domain::error::{Error, Result};
use sa_domain::message::ToolDefinition;
use sa_domain::traits::{ExecCtx, ToolExecutor, ToolOutcome};

use crate::exec::{self, ExecRequest};
use crate::manager::{ExecConfig, ProcessManager};
use crate::process::{self, ProcessRequest};

/// Tool executor backed by the in-process `exec`/`process` tool pair.
/// One `ProcessManager` is shared across every call so background
/// sessions started by `exec` stay addressable by later `process`
/// calls within the same run or a later one.
pub struct BuiltinToolExecutor {
    manager: ProcessManager,
}

impl BuiltinToolExecutor {
    pub fn new(config: ExecConfig) -> Self {
        Self { manager: ProcessManager::new(config) }
    }

    /// Tool definitions this executor understands, for wiring into a
    /// context assembler's `ToolSource` (§4.15).
    pub fn tool_definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "exec".into(),
                description: "Run a shell command. Foreground calls wait up to yield_ms before \
                    auto-backgrounding; background calls return a session_id immediately."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "command": { "type": "string" },
                        "background": { "type": "boolean" },
                        "yield_ms": { "type": "integer" },
                        "timeout_sec": { "type": "integer" },
                        "workdir": { "type": "string" },
                        "env": { "type": "object", "additionalProperties": { "type": "string" } },
                    },
                    "required": ["command"],
                }),
                required_permissions: vec!["exec".into()],
            },
            ToolDefinition {
                name: "process".into(),
                description: "Manage background process sessions started by exec: \
                    list, poll, log, write, kill, clear, or remove."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "action": { "type": "string", "enum": ["list", "poll", "log", "write", "kill", "clear", "remove"] },
                        "session_id": { "type": "string" },
                        "offset": { "type": "integer" },
                        "limit": { "type": "integer" },
                        "tail_lines": { "type": "integer" },
                        "data": { "type": "string" },
                        "eof": { "type": "boolean" },
                    },
                    "required": ["action"],
                }),
                required_permissions: vec!["exec".into()],
            },
        ]
    }
}

#[async_trait]
impl ToolExecutor for BuiltinToolExecutor {
    fn create_context(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        run_id: &str,
        tool_call_id: &str,
        permissions: Vec<String>,
        signal: CancelSignal,
    ) -> ExecCtx {
        ExecCtx {
            session_id: session_id.to_string(),
            user_id: user_id.map(str::to_string),
            run_id: run_id.to_string(),
            tool_call_id: tool_call_id.to_string(),
            permissions,
            signal,
        }
    }

    async fn execute(&self, tool_name: &str, arguments: Value, ctx: &ExecCtx) -> Result<ToolOutcome> {
        if !ctx.permissions.iter().any(|p| p == "exec") {
            return Err(Error::ToolExecution(format!("tool '{tool_name}' requires the 'exec' permission")));
        }

        match tool_name {
            "exec" => {
                let req: ExecRequest = serde_json::from_value(arguments)
                    .map_err(|e| Error::ToolExecution(format!("invalid exec arguments: {e}")))?;
                let resp = exec::exec(&self.manager, req, ctx.signal.clone()).await;
                let content = serde_json::to_string(&resp)?;
                Ok(ToolOutcome { content, data: Some(serde_json::to_value(&resp)?), error: None })
            }
            "process" => {
                let req: ProcessRequest = serde_json::from_value(arguments)
                    .map_err(|e| Error::ToolExecution(format!("invalid process arguments: {e}")))?;
                let resp = process::handle_process(&self.manager, req).await;
                let content = serde_json::to_string(&resp)?;
                let error = if resp.success { None } else { resp.error.clone() };
                Ok(ToolOutcome { content, data: resp.data.clone(), error })
            }
            other => Err(Error::ToolExecution(format!("unknown tool '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecCtx {
        ExecCtx {
            session_id: "s1".into(),
            user_id: None,
            run_id: "r1".into(),
            tool_call_id: "tc1".into(),
            permissions: vec!["exec".into()],
            signal: CancelSignal::never(),
        }
    }

    #[tokio::test]
    async fn exec_runs_a_foreground_command_and_returns_output() {
        let executor = BuiltinToolExecutor::new(ExecConfig::default());
        let outcome = executor
            .execute("exec", serde_json::json!({ "command": "echo hi" }), &ctx())
            .await
            .unwrap();
        assert!(outcome.content.contains("hi"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn execute_rejects_a_tool_without_the_exec_permission() {
        let executor = BuiltinToolExecutor::new(ExecConfig::default());
        let mut c = ctx();
        c.permissions = vec![];
        let err = executor.execute("exec", serde_json::json!({ "command": "echo hi" }), &c).await.unwrap_err();
        assert!(err.to_string().contains("permission"));
    }

    #[tokio::test]
    async fn execute_rejects_an_unknown_tool_name() {
        let executor = BuiltinToolExecutor::new(ExecConfig::default());
        let err = executor.execute("nonexistent", serde_json::json!({}), &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[tokio::test]
    async fn process_list_reports_a_background_session_started_by_exec() {
        let executor = BuiltinToolExecutor::new(ExecConfig::default());
        let exec_outcome = executor
            .execute("exec", serde_json::json!({ "command": "sleep 1", "background": true }), &ctx())
            .await
            .unwrap();
        let data = exec_outcome.data.unwrap();
        assert!(data.get("session_id").is_some());

        let list_outcome = executor.execute("process", serde_json::json!({ "action": "list" }), &ctx()).await.unwrap();
        let data = list_outcome.data.unwrap();
        assert_eq!(data["count"], 1);
    }

    #[tokio::test]
    async fn cancelling_the_signal_interrupts_a_running_foreground_command() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;
        use tokio::sync::Notify;

        let flag = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let signal = CancelSignal::from_parts(flag.clone(), notify.clone());

        let executor = BuiltinToolExecutor::new(ExecConfig::default());
        let mut c = ctx();
        c.signal = signal;

        let run = tokio::spawn(async move {
            executor.execute("exec", serde_json::json!({ "command": "sleep 30" }), &c).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        flag.store(true, std::sync::atomic::Ordering::Release);
        notify.notify_waiters();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(2), run).await.unwrap().unwrap().unwrap();
        assert!(outcome.content.contains("cancelled"));
    }

    #[test]
    fn tool_definitions_cover_exec_and_process() {
        let defs = BuiltinToolExecutor::tool_definitions();
        assert_eq!(defs.len(), 2);
        assert!(defs.iter().any(|d| d.name == "exec"));
        assert!(defs.iter().any(|d| d.name == "process"));
    }
}
