//! Orchestrator configuration tree (§6.5). Loading it from disk (file
//! discovery, env var overrides) is ambient plumbing handled by the
//! `sa-runner-cli` crate's `load_config`; this module only owns the
//! shape, its defaults, and the layered-merge helper `configure()` needs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyConfig::default(),
            limits: LimitsConfig::default(),
            execution: ExecutionConfig::default(),
            retry: RetryConfig::default(),
            streaming: StreamingConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Config {
    /// Merge `overrides` onto `self`, returning the result. Only
    /// fields present in the parsed overrides document replace the
    /// base — this is the layer used by `Orchestrator::configure()`
    /// (§6.5 "partial overrides").
    pub fn merged_with(&self, overrides: PartialConfig) -> Config {
        let mut out = self.clone();
        if let Some(v) = overrides.concurrency {
            out.concurrency = v;
        }
        if let Some(v) = overrides.limits {
            out.limits = v;
        }
        if let Some(v) = overrides.execution {
            out.execution = v;
        }
        if let Some(v) = overrides.retry {
            out.retry = v;
        }
        if let Some(v) = overrides.streaming {
            out.streaming = v;
        }
        if let Some(v) = overrides.persistence {
            out.persistence = v;
        }
        out
    }
}

/// A sparse overlay accepted by `configure()` — any `None` field keeps
/// whatever the merged config already has.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialConfig {
    pub concurrency: Option<ConcurrencyConfig>,
    pub limits: Option<LimitsConfig>,
    pub execution: Option<ExecutionConfig>,
    pub retry: Option<RetryConfig>,
    pub streaming: Option<StreamingConfig>,
    pub persistence: Option<PersistenceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "d_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
    #[serde(default = "d_max_concurrent_tool_calls")]
    pub max_concurrent_tool_calls: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: d_max_concurrent_runs(),
            max_concurrent_tool_calls: d_max_concurrent_tool_calls(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,
    #[serde(default = "d_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default = "d_max_tool_calls_per_round")]
    pub max_tool_calls_per_round: usize,
    #[serde(default = "d_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_turns: d_max_turns(),
            max_tool_rounds: d_max_tool_rounds(),
            max_tool_calls_per_round: d_max_tool_calls_per_round(),
            queue_timeout_ms: d_queue_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "d_true")]
    pub stream_events: bool,
    #[serde(default = "d_true")]
    pub save_to_session: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { stream_events: true, save_to_session: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default = "d_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "d_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "d_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "d_retryable_error_kinds")]
    pub retryable_error_kinds: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: d_max_retries(),
            initial_delay_ms: d_initial_delay_ms(),
            max_delay_ms: d_max_delay_ms(),
            backoff_multiplier: d_backoff_multiplier(),
            retryable_error_kinds: d_retryable_error_kinds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "d_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "d_true")]
    pub enable_backpressure: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { buffer_size: d_buffer_size(), enable_backpressure: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "d_true")]
    pub auto_save: bool,
    #[serde(default = "d_save_interval_ms")]
    pub save_interval_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { auto_save: true, save_interval_ms: d_save_interval_ms() }
    }
}

fn d_max_concurrent_runs() -> usize { 4 }
fn d_max_concurrent_tool_calls() -> usize { 1 }
fn d_max_turns() -> u32 { 50 }
fn d_max_tool_rounds() -> u32 { 25 }
fn d_max_tool_calls_per_round() -> usize { 1 }
fn d_queue_timeout_ms() -> u64 { 30_000 }
fn d_max_retries() -> u32 { 3 }
fn d_initial_delay_ms() -> u64 { 500 }
fn d_max_delay_ms() -> u64 { 10_000 }
fn d_backoff_multiplier() -> f64 { 2.0 }
fn d_retryable_error_kinds() -> Vec<String> {
    vec!["timeout".into(), "http".into(), "provider".into()]
}
fn d_buffer_size() -> usize { 100 }
fn d_save_interval_ms() -> u64 { 5_000 }
fn d_true() -> bool { true }
