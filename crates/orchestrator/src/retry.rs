//! Component 4: the retry engine (§4.4). Per-run attempt counters with
//! exponential backoff, cancel-respecting sleeps, and substring
//! classification against the configured retryable error kinds.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;

use sa_domain::config::RetryConfig;
use sa_domain::{Error, Result};

use crate::cancel::CancelToken;

pub struct RetryEngine {
    config: RetryConfig,
    attempts: Mutex<HashMap<String, u32>>,
}

impl RetryEngine {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempts: Mutex::new(HashMap::new()) }
    }

    /// Substring match of the error's kind tag against the configured
    /// retryable kinds (§4.4 — deliberately not an exact-match enum
    /// comparison, so operators can widen retry policy via config
    /// without a code change).
    pub fn is_retryable(&self, err: &Error) -> bool {
        let tag = err.kind_tag();
        self.config.retryable_error_kinds.iter().any(|k| tag.contains(k.as_str()))
    }

    fn attempts_for(&self, run_id: &str) -> u32 {
        *self.attempts.lock().get(run_id).unwrap_or(&0)
    }

    /// `min(maxDelay, initialDelay * backoffMultiplier^attempts)`.
    pub fn get_delay(&self, run_id: &str) -> u64 {
        let attempts = self.attempts_for(run_id);
        let scaled = self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(attempts as i32);
        (scaled as u64).min(self.config.max_delay_ms)
    }

    /// Drop the attempt counter for a run (called on completion, §4.4).
    pub fn reset(&self, run_id: &str) {
        self.attempts.lock().remove(run_id);
    }

    /// Run `op`, retrying on retryable errors with backoff, respecting
    /// `cancel` at every decision point.
    pub async fn execute<F, Fut, T>(&self, run_id: &str, cancel: &CancelToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            cancel.throw_if_cancelled()?;

            match op().await {
                Ok(value) => {
                    self.reset(run_id);
                    return Ok(value);
                }
                Err(err) => {
                    if !self.is_retryable(&err) {
                        return Err(err);
                    }

                    let attempts = {
                        let mut map = self.attempts.lock();
                        let entry = map.entry(run_id.to_owned()).or_insert(0);
                        *entry += 1;
                        *entry
                    };

                    if attempts > self.config.max_retries {
                        return Err(Error::MaxRetriesExceeded(attempts));
                    }

                    let delay = self.get_delay(run_id);
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_millis(delay)) => {}
                        _ = cancel.cancelled() => {
                            return Err(Error::Cancelled(cancel.reason().unwrap_or_else(|| "run cancelled".into())));
                        }
                    }
                }
            }
        }
    }
}
