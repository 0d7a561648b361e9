//! Component 20: the assembler orchestrator (§4.20). Wires components
//! 12–19 into the concrete `sa_domain::ContextAssembler` the runner
//! depends on: load history, resolve parameters, compose the system
//! prompt, transform and collect, estimate and truncate, cache, return.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::{AssembleOptions, AssembledContext, CompactionCheck, ContextAssembler, Result, SessionStore, ToolDefinition};

use crate::cache::{canonicalize_key, AssemblyCache};
use crate::collector::{self, CollectorInput, SandboxFilter};
use crate::compaction::{self, CompactionInput, CompactionThresholds};
use crate::composer::{self, Section, SkillInfo};
use crate::defaults::{self, ModelLimits, ModelParams};
use crate::estimator::{HeuristicEstimator, TokenEstimator};
use crate::transformer;
use crate::truncation::{self, TruncationStrategy};

/// Static system prompt material that used to be pulled off disk per
/// workspace file; here it is sourced from a pluggable collaborator
/// instead of hardcoded filenames so the
/// assembler stays agnostic of where bootstrap/soul/profile text lives.
#[async_trait]
pub trait BootstrapSource: Send + Sync {
    async fn agent_bootstrap(&self, agent_id: &str) -> Option<String>;
    async fn soul(&self) -> Option<String>;
    async fn user_profile(&self, session_id: &str) -> Option<String>;
    /// `(section name, content)` pairs rendered at `PRIORITY_ADDITIONAL`.
    async fn additional(&self, session_id: &str) -> Vec<(String, String)>;
}

#[async_trait]
pub trait SkillSource: Send + Sync {
    async fn active_skills(&self, session_id: &str) -> Vec<SkillInfo>;
}

pub trait ToolSource: Send + Sync {
    fn tools(&self) -> Vec<ToolDefinition>;
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub max_context_tokens: u32,
    pub reserve_tokens: u32,
    pub truncation_strategy: TruncationStrategy,
    pub compaction_thresholds: CompactionThresholds,
    pub cache_ttl: Duration,
    pub system_defaults: ModelParams,
    pub model_limits: Option<ModelLimits>,
    pub separator: Option<String>,
    pub sandbox: Option<SandboxFilter>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 100_000,
            reserve_tokens: 4096,
            truncation_strategy: TruncationStrategy::PairPreserving,
            compaction_thresholds: CompactionThresholds::default(),
            cache_ttl: Duration::from_secs(60),
            system_defaults: ModelParams::default(),
            model_limits: None,
            separator: None,
            sandbox: None,
        }
    }
}

pub struct Assembler {
    session_store: Arc<dyn SessionStore>,
    bootstrap: Option<Arc<dyn BootstrapSource>>,
    skills: Option<Arc<dyn SkillSource>>,
    tools: Option<Arc<dyn ToolSource>>,
    estimator: Arc<dyn TokenEstimator>,
    cache: AssemblyCache,
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new(session_store: Arc<dyn SessionStore>, config: AssemblerConfig) -> Self {
        let cache = AssemblyCache::new(config.cache_ttl);
        Self { session_store, bootstrap: None, skills: None, tools: None, estimator: Arc::new(HeuristicEstimator), cache, config }
    }

    pub fn with_bootstrap(mut self, bootstrap: Arc<dyn BootstrapSource>) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn with_skills(mut self, skills: Arc<dyn SkillSource>) -> Self {
        self.skills = Some(skills);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolSource>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    async fn build(&self, session_id: &str, agent_id: &str, metadata: &Value, options: &AssembleOptions) -> Result<AssembledContext> {
        let messages = self.session_store.get_messages(session_id).await?;

        let agent_params = agent_params_from_metadata(metadata);
        let session_params = session_params_from_metadata(metadata);
        let request_params = ModelParams { max_tokens: options.max_tokens, ..Default::default() };
        let params = defaults::resolve(
            &self.config.system_defaults,
            &agent_params,
            &session_params,
            &request_params,
            self.config.model_limits.as_ref(),
        )
        .unwrap_or_else(|_| self.config.system_defaults.clone());

        let mut sections = Vec::new();
        if let Some(bootstrap) = &self.bootstrap {
            if let Some(text) = bootstrap.agent_bootstrap(agent_id).await {
                sections.push(Section::new("agent_bootstrap", text, composer::PRIORITY_AGENT_BOOTSTRAP));
            }
            if let Some(text) = bootstrap.soul().await {
                sections.push(Section::new("soul", text, composer::PRIORITY_SOUL));
            }
            if let Some(text) = bootstrap.user_profile(session_id).await {
                sections.push(Section::new("user_profile", text, composer::PRIORITY_USER_PROFILE));
            }
            for (name, content) in bootstrap.additional(session_id).await {
                sections.push(Section::new(name, content, composer::PRIORITY_ADDITIONAL));
            }
        }

        let skills = match &self.skills {
            Some(source) => source.active_skills(session_id).await,
            None => Vec::new(),
        };
        if !skills.is_empty() {
            sections.push(Section::new("skills", composer::render_skills_section(&skills), composer::PRIORITY_SKILLS));
        }

        sections.push(Section::new("datetime", composer::render_datetime_section(chrono::Utc::now()), composer::PRIORITY_DATETIME));

        let system_prompt = composer::compose(sections, self.config.separator.as_deref());

        let transformed = transformer::transform(&messages);

        let executor_tools = self.tools.as_ref().map(|t| t.tools()).unwrap_or_default();
        let skill_tools: Vec<Vec<ToolDefinition>> = skills.iter().map(|s| s.tools.clone()).collect();
        let collected_tools = collector::collect(CollectorInput {
            executor_tools,
            skill_tools,
            additional_tools: Vec::new(),
            sandbox: self.config.sandbox.clone(),
            granted_permissions: None,
            exclude: Vec::new(),
        });

        let system_prompt_tokens = self.estimator.estimate_system_prompt(&system_prompt);
        let tools_tokens = self.estimator.estimate_tools(&collected_tools);

        let max_tokens = params.max_tokens.unwrap_or(self.config.max_context_tokens);
        let budget = truncation::compute_budget(max_tokens, self.config.reserve_tokens, system_prompt_tokens, tools_tokens);
        let truncated = truncation::truncate(&transformed, self.config.truncation_strategy, budget, self.estimator.as_ref());

        if truncated.removed_count > 0 {
            tracing::debug!(
                session_id,
                removed_count = truncated.removed_count,
                removed_tokens = truncated.removed_tokens,
                "truncated context to fit budget"
            );
        }

        let estimated_tokens = system_prompt_tokens + tools_tokens + truncated.final_tokens;

        Ok(AssembledContext {
            system_prompt,
            messages: truncated.messages,
            tools: collected_tools,
            parameters: params.into(),
            estimated_tokens,
        })
    }
}

/// Layer 2 (§4.18): session metadata fields tagged `defaultX`, set by
/// an agent's own configuration rather than per-session state.
fn agent_params_from_metadata(metadata: &Value) -> ModelParams {
    ModelParams {
        model_id: metadata.get("defaultModelId").and_then(Value::as_str).map(String::from),
        temperature: metadata.get("defaultTemperature").and_then(Value::as_f64),
        top_p: metadata.get("defaultTopP").and_then(Value::as_f64),
        top_k: metadata.get("defaultTopK").and_then(Value::as_u64).map(|v| v as u32),
        max_tokens: metadata.get("defaultMaxTokens").and_then(Value::as_u64).map(|v| v as u32),
        thinking_budget: metadata.get("defaultThinkingBudget").and_then(Value::as_u64).map(|v| v as u32),
    }
}

/// Layer 3 (§4.18): plain session metadata fields, set by the session
/// itself (e.g. a prior turn pinning a model or temperature).
fn session_params_from_metadata(metadata: &Value) -> ModelParams {
    ModelParams {
        model_id: metadata.get("modelId").and_then(Value::as_str).map(String::from),
        temperature: metadata.get("temperature").and_then(Value::as_f64),
        top_p: metadata.get("topP").and_then(Value::as_f64),
        top_k: metadata.get("topK").and_then(Value::as_u64).map(|v| v as u32),
        max_tokens: metadata.get("maxTokens").and_then(Value::as_u64).map(|v| v as u32),
        thinking_budget: metadata.get("thinkingBudget").and_then(Value::as_u64).map(|v| v as u32),
    }
}

fn metadata_updated_at(metadata: &Value) -> String {
    metadata.get("updatedAt").and_then(Value::as_str).unwrap_or("").to_string()
}

fn metadata_message_count(metadata: &Value) -> usize {
    metadata.get("messageCount").and_then(Value::as_u64).unwrap_or(0) as usize
}

#[async_trait]
impl ContextAssembler for Assembler {
    async fn assemble(&self, session_id: &str, agent_id: &str, options: AssembleOptions) -> Result<AssembledContext> {
        let metadata = self.session_store.get_metadata(session_id).await?;
        let key = canonicalize_key(session_id, &options, &metadata_updated_at(&metadata), metadata_message_count(&metadata));

        if let Some(cached) = self.cache.get(&key) {
            return Ok((*cached).clone());
        }

        let assembled = self.build(session_id, agent_id, &metadata, &options).await?;
        self.cache.put(key, Arc::new(assembled.clone()));
        Ok(assembled)
    }

    async fn check_compaction(&self, session_id: &str, _agent_id: &str) -> Result<CompactionCheck> {
        let messages = self.session_store.get_messages(session_id).await?;
        let tool_call_count =
            messages.iter().filter(|m| matches!(m.kind, sa_domain::SessionMessageKind::ToolCall)).count() as u32;
        let transformed = transformer::transform(&messages);
        let current_tokens: u32 = transformed.iter().map(|m| self.estimator.estimate_message(m)).sum();

        let input = CompactionInput {
            message_count: messages.len() as u32,
            tool_call_count,
            current_tokens,
            max_context_tokens: self.config.max_context_tokens,
            // A caller wanting an explicit/forced compaction calls
            // `invalidate_cache` plus its own store-level compaction
            // instead — `check_compaction`'s trait signature carries no
            // explicit flag, so only the threshold-based reasons are
            // reachable here.
            explicit: false,
        };
        Ok(compaction::detect(&input, &self.config.compaction_thresholds))
    }

    async fn invalidate_cache(&self, session_id: &str) {
        self.cache.invalidate(session_id);
    }
}
