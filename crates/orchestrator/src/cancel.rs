//! Component 3: the cancellation controller (§4.3). Per-run cancel
//! tokens keyed by `runId`, scoped to runs rather than sessions, with
//! a reason string and a `Notify` so blocking primitives (retry sleeps,
//! lock waiters) can wake promptly instead of polling `is_cancelled()`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use sa_domain::Error;

/// A cancel signal for a single run. Cloning shares the underlying flag.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            reason: Arc::new(Mutex::new(None)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self, reason: impl Into<String>) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            *self.reason.lock() = Some(reason.into());
        }
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Fail with `Cancelled` if the signal has fired; otherwise `Ok(())`.
    pub fn throw_if_cancelled(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled(self.reason().unwrap_or_else(|| "run cancelled".to_string())))
        } else {
            Ok(())
        }
    }

    /// A read-only view of this token's flag, suitable for handing to an
    /// external collaborator (e.g. [`sa_domain::ExecCtx::signal`]) that
    /// should not be able to fire cancellation itself.
    pub fn signal(&self) -> sa_domain::CancelSignal {
        sa_domain::CancelSignal::from_parts(self.cancelled.clone(), self.notify.clone())
    }

    /// Resolve as soon as the token is cancelled. Any blocking operation
    /// in the core selects on this alongside its own progress.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks active cancel tokens per runId.
pub struct CancelController {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelController {
    pub fn new() -> Self {
        Self { tokens: Mutex::new(HashMap::new()) }
    }

    /// Create and register a fresh cancel token for a run.
    pub fn create(&self, run_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(run_id.to_owned(), token.clone());
        token
    }

    /// Signal cancellation for a run. Idempotent; a second call with a
    /// different reason does not overwrite the first.
    pub fn cancel(&self, run_id: &str, reason: impl Into<String>) -> bool {
        if let Some(token) = self.tokens.lock().get(run_id) {
            token.cancel(reason);
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self, run_id: &str) -> bool {
        self.tokens.lock().get(run_id).map(CancelToken::is_cancelled).unwrap_or(false)
    }

    pub fn throw_if_cancelled(&self, run_id: &str) -> Result<(), Error> {
        match self.tokens.lock().get(run_id) {
            Some(token) => token.throw_if_cancelled(),
            // After cleanup a run is, by definition, no longer cancellable.
            None => Ok(()),
        }
    }

    /// Remove the token for a run. After this, queries report
    /// "not cancelled" for that runId.
    pub fn cleanup(&self, run_id: &str) {
        self.tokens.lock().remove(run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_cancel_then_cleanup_resets_status() {
        let ctl = CancelController::new();
        ctl.create("r1");
        assert!(!ctl.is_cancelled("r1"));
        assert!(ctl.cancel("r1", "stop"));
        assert!(ctl.is_cancelled("r1"));
        ctl.cleanup("r1");
        assert!(!ctl.is_cancelled("r1"));
    }

    #[test]
    fn cancel_unknown_run_returns_false() {
        let ctl = CancelController::new();
        assert!(!ctl.cancel("ghost", "x"));
    }

    #[test]
    fn throw_if_cancelled_carries_reason() {
        let ctl = CancelController::new();
        ctl.create("r1");
        ctl.cancel("r1", "user requested stop");
        let err = ctl.throw_if_cancelled("r1").unwrap_err();
        match err {
            Error::Cancelled(msg) => assert_eq!(msg, "user requested stop"),
            _ => panic!("expected Cancelled"),
        }
    }

    #[test]
    fn cleanup_is_safe_to_call_twice() {
        let ctl = CancelController::new();
        ctl.create("r1");
        ctl.cleanup("r1");
        ctl.cleanup("r1");
        assert!(!ctl.is_cancelled("r1"));
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        token.cancel("go");
        tokio::time::timeout(std::time::Duration::from_millis(200), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancelled_future_resolves_immediately_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel("already done");
        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled()).await.unwrap();
    }
}
