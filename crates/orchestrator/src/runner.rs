//! Component 11: the Runner (§4.11) — the top-level control flow that
//! drives a single run from admission through its terminal event.
//! Spawns a task, streams events back over a channel, and always
//! cleans up the cancel handle on the way out; provider and tool calls
//! go through the [`sa_domain::ModelAdapter`] and [`sa_domain::ToolExecutor`]
//! contracts rather than any single fixed provider or per-provider tool
//! dispatch.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::Instrument;

use sa_domain::config::PartialConfig;
use sa_domain::{
    AgentEvent, AssembleOptions, ChatParams, Config, ContextAssembler, Error, Message, MessageContent, ModelAdapter,
    ModelChunk, ModelResponse, Result, RunContext, RunResult, RunState, SessionMessageKind, SessionStore, StopReason,
    ToolCall, ToolExecutor, ToolResultPayload,
};

use crate::admission_queue::AdmissionQueue;
use crate::cancel::{CancelController, CancelToken};
use crate::event_stream::{self, EventStreamConsumer, EventStreamProducer};
use crate::hooks::{HookContext, HookName, HooksRegistry};
use crate::lock_manager::SessionLockManager;
use crate::retry::RetryEngine;
use crate::run_id;
use crate::state_machine;
use crate::tool_parser;
use crate::turn_driver::TurnDriver;

/// Input to [`Orchestrator::execute`] (§6.1).
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub message: MessageContent,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub priority: i64,
    pub model: Option<String>,
    pub user_id: Option<String>,
    pub permissions: Vec<String>,
    pub context_options: AssembleOptions,
}

impl RunRequest {
    pub fn new(message: MessageContent) -> Self {
        Self {
            message,
            session_id: None,
            agent_id: None,
            priority: 0,
            model: None,
            user_id: None,
            permissions: Vec::new(),
            context_options: AssembleOptions::default(),
        }
    }

    /// Convenience constructor for a plain-text user message.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(MessageContent::Text(text.into()))
    }
}

/// `{runId, sessionId, state, events, cancel()}` (§6.1).
pub struct RunHandle {
    pub run_id: String,
    pub session_id: String,
    state: Arc<Mutex<RunState>>,
    events: EventStreamConsumer,
    cancel_controller: Arc<CancelController>,
    admission_queue: Arc<AdmissionQueue>,
}

impl RunHandle {
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Pull the next event. `None` once the run's stream has closed.
    pub async fn next_event(&mut self) -> Option<Result<AgentEvent>> {
        self.events.next_event().await
    }

    /// Signal cancellation and, if the run hasn't been admitted yet,
    /// drop it from the admission queue immediately (§5 "Cancellation":
    /// `cancel(runId)` marks the signal and removes the run from the
    /// queue if present).
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let cancelled = self.cancel_controller.cancel(&self.run_id, reason);
        self.admission_queue.remove(&self.run_id);
        cancelled
    }
}

/// Drives runs against a fixed set of collaborators (§6.4). Owns
/// components 1, 3, 4, 6, 7, 8, 10 and calls into components 2, 9
/// directly; component 5 is created fresh per run.
pub struct Orchestrator {
    config: Mutex<Config>,
    admission_queue: Arc<AdmissionQueue>,
    cancel_controller: Arc<CancelController>,
    lock_manager: Arc<SessionLockManager>,
    retry_engine: Mutex<Arc<RetryEngine>>,
    hooks: Arc<HooksRegistry>,
    session_store: Arc<dyn SessionStore>,
    model_adapter: Arc<dyn ModelAdapter>,
    tool_executor: Arc<dyn ToolExecutor>,
    context_assembler: Arc<dyn ContextAssembler>,
}

impl Orchestrator {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        model_adapter: Arc<dyn ModelAdapter>,
        tool_executor: Arc<dyn ToolExecutor>,
        context_assembler: Arc<dyn ContextAssembler>,
        config: Config,
    ) -> Arc<Self> {
        let queue_capacity = config.concurrency.max_concurrent_runs;
        let retry_engine = Arc::new(RetryEngine::new(config.retry.clone()));
        Arc::new(Self {
            config: Mutex::new(config),
            admission_queue: Arc::new(AdmissionQueue::new(queue_capacity)),
            cancel_controller: Arc::new(CancelController::new()),
            lock_manager: Arc::new(SessionLockManager::new()),
            retry_engine: Mutex::new(retry_engine),
            hooks: Arc::new(HooksRegistry::new()),
            session_store,
            model_adapter,
            tool_executor,
            context_assembler,
        })
    }

    pub fn get_config(&self) -> Config {
        self.config.lock().clone()
    }

    /// Merge `overrides` onto the current config (§6.5 "partial overrides").
    pub fn configure(&self, overrides: PartialConfig) {
        let mut cfg = self.config.lock();
        let merged = cfg.merged_with(overrides);
        *self.retry_engine.lock() = Arc::new(RetryEngine::new(merged.retry.clone()));
        *cfg = merged;
    }

    pub fn on(&self, name: HookName, handler: crate::hooks::HookHandler) {
        self.hooks.register(name, handler);
    }

    /// Begin a run. Returns immediately; the lifecycle runs on a
    /// spawned task and streams its events back through the handle.
    pub fn execute(self: &Arc<Self>, request: RunRequest) -> RunHandle {
        let run_id = run_id::generate();
        let session_id = request.session_id.clone().unwrap_or_else(|| "default".to_string());
        let buffer_size = self.config.lock().streaming.buffer_size;
        let (producer, consumer) = event_stream::channel(buffer_size);
        let cancel_token = self.cancel_controller.create(&run_id);
        let state = Arc::new(Mutex::new(RunState::Pending));

        let orchestrator = self.clone();
        let handle_run_id = run_id.clone();
        let handle_session_id = session_id.clone();
        let task_state = state.clone();
        let span = tracing::info_span!("run", run_id = %run_id, session_id = %session_id);
        tokio::spawn(
            async move {
                orchestrator
                    .drive(handle_run_id, handle_session_id, request, producer, cancel_token, task_state)
                    .await;
            }
            .instrument(span),
        );

        RunHandle {
            run_id,
            session_id,
            state,
            events: consumer,
            cancel_controller: self.cancel_controller.clone(),
            admission_queue: self.admission_queue.clone(),
        }
    }

    /// The full lifecycle (§4.11 steps 1–8). Never returns an error —
    /// every failure path is translated into a terminal event before
    /// this returns.
    async fn drive(
        self: Arc<Self>,
        run_id: String,
        session_id: String,
        request: RunRequest,
        producer: EventStreamProducer,
        cancel_token: CancelToken,
        state: Arc<Mutex<RunState>>,
    ) {
        let mut current = RunState::Pending;

        self.admission_queue.enqueue(run_id.clone(), session_id.clone(), request.priority);
        let position = self.admission_queue.position(&run_id).unwrap_or(1);
        producer.emit(AgentEvent::RunQueued { run_id: run_id.clone(), position }).await;
        current = self.set_state(&state, current, RunState::Queued);

        tokio::select! {
            _ = self.admission_queue.wait_for_admission(&run_id) => {}
            _ = cancel_token.cancelled() => {
                // Cancelled while still queued; the handle's `cancel()`
                // already removed us from the admission queue, but do it
                // again defensively in case admission raced it.
                self.admission_queue.remove(&run_id);
                self.set_state(&state, current, RunState::Cancelled);
                producer
                    .emit(AgentEvent::RunCancelled {
                        run_id: run_id.clone(),
                        reason: cancel_token.reason().unwrap_or_else(|| "run cancelled".to_string()),
                    })
                    .await;
                self.cleanup(&run_id, &producer).await;
                return;
            }
        }

        let queue_timeout_ms = self.config.lock().limits.queue_timeout_ms;
        let guard = match self.lock_manager.acquire(&session_id, &run_id, Duration::from_millis(queue_timeout_ms)).await {
            Ok(guard) => guard,
            Err(err) => {
                self.set_state(&state, current, RunState::Timeout);
                producer.emit(AgentEvent::RunError { run_id: run_id.clone(), error: err.to_string() }).await;
                self.cleanup(&run_id, &producer).await;
                return;
            }
        };
        current = self.set_state(&state, current, RunState::Running);

        self.hooks
            .execute(
                HookName::BeforeRun,
                HookContext { run_id: run_id.clone(), session_id: session_id.clone(), payload: Value::Null },
            )
            .await;

        let outcome = self.run_turns(&run_id, &session_id, &request, &producer, &cancel_token).await;

        match outcome {
            Ok(result) => {
                self.set_state(&state, current, result.state);
                producer.emit(AgentEvent::RunCompleted { run_id: run_id.clone(), result }).await;
            }
            Err(err) if err.is_cancelled() => {
                self.set_state(&state, current, RunState::Cancelled);
                producer
                    .emit(AgentEvent::RunCancelled { run_id: run_id.clone(), reason: err.to_string() })
                    .await;
            }
            Err(err) => {
                self.set_state(&state, current, RunState::Failed);
                producer.emit(AgentEvent::RunError { run_id: run_id.clone(), error: err.to_string() }).await;
                self.hooks
                    .execute(
                        HookName::OnError,
                        HookContext {
                            run_id: run_id.clone(),
                            session_id: session_id.clone(),
                            payload: serde_json::json!({ "error": err.to_string() }),
                        },
                    )
                    .await;
            }
        }

        self.hooks
            .execute(
                HookName::AfterRun,
                HookContext { run_id: run_id.clone(), session_id: session_id.clone(), payload: Value::Null },
            )
            .await;

        drop(guard);
        self.cleanup(&run_id, &producer).await;
    }

    fn set_state(&self, state: &Mutex<RunState>, from: RunState, to: RunState) -> RunState {
        match state_machine::transition(from, to) {
            Ok(next) => {
                *state.lock() = next;
                next
            }
            Err(_) => from,
        }
    }

    async fn cleanup(&self, run_id: &str, producer: &EventStreamProducer) {
        self.admission_queue.complete(run_id);
        self.cancel_controller.cleanup(run_id);
        self.retry_engine.lock().reset(run_id);
        producer.close();
    }

    /// Steps 5–6: persist the user message, then loop turns until the
    /// model stops requesting tools or a budget is exhausted.
    async fn run_turns(
        &self,
        run_id: &str,
        session_id: &str,
        request: &RunRequest,
        producer: &EventStreamProducer,
        cancel_token: &CancelToken,
    ) -> Result<RunResult> {
        let agent_id = request.agent_id.clone().unwrap_or_else(|| "default".to_string());
        let model = request.model.clone().unwrap_or_else(|| "default".to_string());

        let existing = self.session_store.get_messages(session_id).await?;
        let parent_id = existing.last().map(|m| m.id.clone());
        let user_message = self
            .session_store
            .append(session_id, SessionMessageKind::User, request.message.clone(), parent_id)
            .await?;
        producer.emit(AgentEvent::RunStarted { run_id: run_id.to_string() }).await;

        let (max_turns, max_tool_rounds, max_concurrent_tool_calls, max_tool_calls_per_round) = {
            let cfg = self.config.lock();
            (
                cfg.limits.max_turns,
                cfg.limits.max_tool_rounds,
                cfg.concurrency.max_concurrent_tool_calls,
                cfg.limits.max_tool_calls_per_round,
            )
        };
        let turn_driver = TurnDriver::new(max_turns, max_tool_rounds);
        let mut run_context = RunContext::default();
        let mut pending: Vec<Message> = Vec::new();

        loop {
            cancel_token.throw_if_cancelled()?;

            if let Err(stop_reason) = turn_driver.can_continue() {
                return Ok(RunResult {
                    run_id: run_id.to_string(),
                    session_id: session_id.to_string(),
                    state: RunState::Completed,
                    stop_reason,
                    message: None,
                    usage: None,
                    context: run_context,
                });
            }
            turn_driver.start_turn();

            producer.emit(AgentEvent::ContextStart).await;
            let assembled = self
                .context_assembler
                .assemble(session_id, &agent_id, request.context_options.clone())
                .await?;
            producer
                .emit(AgentEvent::ContextComplete {
                    context: serde_json::to_value(&assembled).unwrap_or(Value::Null),
                })
                .await;
            self.hooks
                .execute(
                    HookName::AfterContextAssembly,
                    HookContext {
                        run_id: run_id.to_string(),
                        session_id: session_id.to_string(),
                        payload: Value::Null,
                    },
                )
                .await;

            let mut messages = assembled.messages.clone();
            messages.extend(pending.iter().cloned());
            let chat_params = ChatParams {
                model: model.clone(),
                system_prompt: assembled.system_prompt.clone(),
                messages,
                tools: assembled.tools.clone(),
                parameters: assembled.parameters.clone(),
            };

            let response = self.call_model(run_id, session_id, cancel_token, producer, chat_params).await?;
            if let Some(usage) = response.usage {
                run_context.record_model_usage(usage);
            }

            let tool_calls = tool_parser::extract(&response);
            if tool_calls.is_empty() {
                self.session_store
                    .append(
                        session_id,
                        SessionMessageKind::Assistant,
                        MessageContent::Text(response.content.clone()),
                        Some(user_message.id.clone()),
                    )
                    .await?;
                return Ok(RunResult {
                    run_id: run_id.to_string(),
                    session_id: session_id.to_string(),
                    state: RunState::Completed,
                    stop_reason: StopReason::Stop,
                    message: Some(response.content),
                    usage: response.usage,
                    context: run_context,
                });
            }

            tool_parser::validate(&tool_calls)?;
            turn_driver.start_tool_round();

            let round = self
                .run_tool_round(
                    run_id,
                    session_id,
                    request,
                    cancel_token,
                    producer,
                    &tool_calls,
                    max_concurrent_tool_calls.min(max_tool_calls_per_round).max(1),
                )
                .await;

            for (call, payload, succeeded) in round {
                run_context.record_tool_result(succeeded);
                pending.push(Message::assistant_tool_use(call.id.clone(), call.name.clone(), call.arguments.clone()));
                let content = payload.result.clone().or_else(|| payload.error.clone()).unwrap_or_default();
                pending.push(Message::tool_result(call.id, content, !succeeded));
            }
        }
    }

    async fn call_model(
        &self,
        run_id: &str,
        session_id: &str,
        cancel_token: &CancelToken,
        producer: &EventStreamProducer,
        chat_params: ChatParams,
    ) -> Result<ModelResponse> {
        producer.emit(AgentEvent::ModelStart).await;
        self.hooks
            .execute(
                HookName::BeforeModelCall,
                HookContext {
                    run_id: run_id.to_string(),
                    session_id: session_id.to_string(),
                    payload: serde_json::json!({ "model": chat_params.model.clone() }),
                },
            )
            .await;

        let retry_engine = self.retry_engine.lock().clone();
        let model_adapter = self.model_adapter.clone();
        let mut stream = retry_engine
            .execute(run_id, cancel_token, move || {
                let model_adapter = model_adapter.clone();
                let params = chat_params.clone();
                async move { model_adapter.stream(params).await }
            })
            .await?;

        let mut response = None;
        while let Some(chunk) = stream.next().await {
            cancel_token.throw_if_cancelled()?;
            match chunk {
                ModelChunk::Content { delta } => producer.emit(AgentEvent::ModelDelta { delta }).await,
                ModelChunk::Thinking { delta } => producer.emit(AgentEvent::ModelThinking { delta }).await,
                ModelChunk::Response(resp) => {
                    response = Some(resp);
                    break;
                }
            }
        }
        let response = response.ok_or_else(|| Error::Provider {
            provider: "model".into(),
            message: "stream ended without a terminal response chunk".into(),
        })?;

        producer.emit(AgentEvent::ModelComplete { response: response.clone() }).await;
        self.hooks
            .execute(
                HookName::AfterModelCall,
                HookContext { run_id: run_id.to_string(), session_id: session_id.to_string(), payload: Value::Null },
            )
            .await;
        Ok(response)
    }

    /// Execute one tool round, bounded by `max_parallel` concurrent
    /// calls. Returns `(call, result payload, succeeded)` in the same
    /// order as `tool_calls` — `join_all` preserves input order
    /// regardless of completion order, so per-call `tool.start` →
    /// `tool.complete`/`tool.error` ordering holds without needing to
    /// serialize execution itself.
    #[allow(clippy::too_many_arguments)]
    async fn run_tool_round(
        &self,
        run_id: &str,
        session_id: &str,
        request: &RunRequest,
        cancel_token: &CancelToken,
        producer: &EventStreamProducer,
        tool_calls: &[ToolCall],
        max_parallel: usize,
    ) -> Vec<(ToolCall, ToolResultPayload, bool)> {
        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let signal = cancel_token.signal();

        let futures = tool_calls.iter().cloned().map(|call| {
            let semaphore = semaphore.clone();
            let producer = producer.clone();
            let hooks = self.hooks.clone();
            let tool_executor = self.tool_executor.clone();
            let session_id = session_id.to_string();
            let run_id = run_id.to_string();
            let user_id = request.user_id.clone();
            let permissions = request.permissions.clone();
            let signal = signal.clone();
            async move {
                producer
                    .emit(AgentEvent::ToolStart {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .await;
                hooks
                    .execute(
                        HookName::BeforeToolExecution,
                        HookContext {
                            run_id: run_id.clone(),
                            session_id: session_id.clone(),
                            payload: serde_json::json!({ "toolCallId": call.id.clone(), "toolName": call.name.clone() }),
                        },
                    )
                    .await;

                let permit = semaphore.acquire_owned().await.expect("tool semaphore is never closed");
                let ctx = tool_executor.create_context(
                    &session_id,
                    user_id.as_deref(),
                    &run_id,
                    &call.id,
                    permissions.clone(),
                    signal.clone(),
                );
                let outcome = tool_executor.execute(&call.name, call.arguments.clone(), &ctx).await;
                drop(permit);

                let (payload, succeeded) = match outcome {
                    Ok(o) if o.error.is_none() => {
                        (ToolResultPayload { tool_call_id: call.id.clone(), result: Some(o.content), error: None }, true)
                    }
                    Ok(o) => (
                        ToolResultPayload { tool_call_id: call.id.clone(), result: None, error: o.error },
                        false,
                    ),
                    Err(err) => (
                        ToolResultPayload { tool_call_id: call.id.clone(), result: None, error: Some(err.to_string()) },
                        false,
                    ),
                };

                if succeeded {
                    producer.emit(AgentEvent::ToolComplete { tool_call_id: call.id.clone(), result: payload.clone() }).await;
                } else {
                    producer
                        .emit(AgentEvent::ToolError {
                            tool_call_id: call.id.clone(),
                            error: payload.error.clone().unwrap_or_default(),
                        })
                        .await;
                }
                hooks
                    .execute(
                        HookName::AfterToolExecution,
                        HookContext {
                            run_id,
                            session_id,
                            payload: serde_json::json!({ "toolCallId": call.id.clone(), "succeeded": succeeded }),
                        },
                    )
                    .await;

                (call, payload, succeeded)
            }
        });

        futures_util::future::join_all(futures).await
    }
}
