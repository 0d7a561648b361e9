//! Component 7: the per-session lock manager (§4.7). A
//! `Semaphore(1)` per session key gives FIFO waiter ordering for free.
//! Generalized from a "one turn + one queued waiter, reject otherwise"
//! policy to an unbounded FIFO waiter list with a per-acquire timeout
//! and `forceRelease`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use sa_domain::{Error, Result};

struct SessionState {
    semaphore: Arc<Semaphore>,
    /// `run_id` of the current holder, if any — purely for
    /// introspection; the semaphore permit is what actually enforces
    /// exclusion (§3 SessionLock invariant).
    holder: Option<String>,
}

pub struct SessionLockManager {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl Default for SessionLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLockManager {
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()) }
    }

    fn semaphore_for(&self, session_id: &str) -> Arc<Semaphore> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| SessionState { semaphore: Arc::new(Semaphore::new(1)), holder: None })
            .semaphore
            .clone()
    }

    /// Acquire the lock for `session_id` on behalf of `run_id`, waiting
    /// up to `timeout` for the current holder (and any earlier FIFO
    /// waiters) to release. `tokio::sync::Semaphore::acquire` grants
    /// permits in the order they were requested, so waiter ordering
    /// always matches acquisition order.
    pub async fn acquire(&self, session_id: &str, run_id: &str, timeout: Duration) -> Result<LockGuard> {
        let sem = self.semaphore_for(session_id);
        let permit = match tokio::time::timeout(timeout, sem.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                // The semaphore was closed by `force_release` — treat as
                // a fresh contention round rather than a hard failure.
                return Err(Error::AcquireTimeout(timeout.as_millis() as u64));
            }
            Err(_elapsed) => return Err(Error::AcquireTimeout(timeout.as_millis() as u64)),
        };

        {
            let mut sessions = self.sessions.lock();
            if let Some(state) = sessions.get_mut(session_id) {
                state.holder = Some(run_id.to_owned());
            }
        }

        Ok(LockGuard {
            session_id: session_id.to_owned(),
            run_id: run_id.to_owned(),
            permit: Mutex::new(Some(permit)),
            released: AtomicBool::new(false),
        })
    }

    /// Release the lock if `run_id` is the recorded holder; a no-op for
    /// any other caller (§4.7 "non-holder release is a no-op"). Prefer
    /// calling [`LockGuard::release`] directly — this exists for callers
    /// that only have identifiers, not the guard.
    pub fn release(&self, session_id: &str, run_id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(state) = sessions.get_mut(session_id) {
            if state.holder.as_deref() == Some(run_id) {
                state.holder = None;
            }
        }
    }

    /// Forcibly clear a session's lock, rejecting every current waiter.
    /// Closing the semaphore fails all pending and future `acquire_owned`
    /// calls; the next `acquire` rebuilds a fresh semaphore for the
    /// session, so subsequent callers are unaffected.
    pub fn force_release(&self, session_id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(state) = sessions.remove(session_id) {
            state.semaphore.close();
        }
    }

    pub fn is_locked(&self, session_id: &str) -> bool {
        self.sessions.lock().get(session_id).map(|s| s.holder.is_some()).unwrap_or(false)
    }

    pub fn holder(&self, session_id: &str) -> Option<String> {
        self.sessions.lock().get(session_id).and_then(|s| s.holder.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

/// A held session lock. `release()` is idempotent and may additionally
/// run via `Drop` if the caller forgets — either path drops the permit
/// exactly once (§1.2 "idempotent release semantics").
pub struct LockGuard {
    session_id: String,
    run_id: String,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
    released: AtomicBool,
}

impl LockGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Drop the held permit. Safe to call more than once.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.permit.lock().take();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_acquire_on_same_session() {
        let mgr = SessionLockManager::new();
        let g1 = mgr.acquire("s1", "r1", Duration::from_millis(100)).await.unwrap();
        assert!(mgr.is_locked("s1"));
        g1.release();
        assert!(!mgr.is_locked("s1"));

        let g2 = mgr.acquire("s1", "r2", Duration::from_millis(100)).await.unwrap();
        assert_eq!(mgr.holder("s1"), Some("r2".to_string()));
        drop(g2);
    }

    #[tokio::test]
    async fn different_sessions_acquire_concurrently() {
        let mgr = Arc::new(SessionLockManager::new());
        let g1 = mgr.acquire("s1", "r1", Duration::from_millis(100)).await.unwrap();
        let g2 = mgr.acquire("s2", "r2", Duration::from_millis(100)).await.unwrap();
        assert_eq!(mgr.session_count(), 2);
        drop(g1);
        drop(g2);
    }

    #[tokio::test]
    async fn second_run_waits_then_acquires_fifo() {
        let mgr = Arc::new(SessionLockManager::new());
        let g1 = mgr.acquire("s1", "r1", Duration::from_secs(5)).await.unwrap();

        let mgr2 = mgr.clone();
        let waiter = tokio::spawn(async move { mgr2.acquire("s1", "r2", Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        g1.release();
        let g2 = tokio::time::timeout(Duration::from_millis(200), waiter).await.unwrap().unwrap().unwrap();
        assert_eq!(g2.run_id(), "r2");
    }

    #[tokio::test]
    async fn acquire_times_out_while_another_run_holds_the_lock() {
        let mgr = SessionLockManager::new();
        let _g1 = mgr.acquire("s1", "r1", Duration::from_secs(5)).await.unwrap();
        let err = mgr.acquire("s1", "r2", Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, Error::AcquireTimeout(_)));
    }

    #[tokio::test]
    async fn release_by_non_holder_is_a_no_op() {
        let mgr = SessionLockManager::new();
        let g1 = mgr.acquire("s1", "r1", Duration::from_millis(100)).await.unwrap();
        mgr.release("s1", "someone-else");
        assert!(mgr.is_locked("s1"), "non-holder release must not clear the lock");
        g1.release();
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let mgr = SessionLockManager::new();
        let g1 = mgr.acquire("s1", "r1", Duration::from_millis(100)).await.unwrap();
        g1.release();
        g1.release();
        let g2 = mgr.acquire("s1", "r2", Duration::from_millis(100)).await.unwrap();
        drop(g2);
    }

    #[tokio::test]
    async fn force_release_rejects_waiters_and_frees_the_session() {
        let mgr = Arc::new(SessionLockManager::new());
        let _g1 = mgr.acquire("s1", "r1", Duration::from_secs(5)).await.unwrap();

        let mgr2 = mgr.clone();
        let waiter = tokio::spawn(async move { mgr2.acquire("s1", "r2", Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        mgr.force_release("s1");
        let result = tokio::time::timeout(Duration::from_millis(200), waiter).await.unwrap().unwrap();
        assert!(result.is_err());

        // A fresh acquire after force_release succeeds immediately.
        let g3 = mgr.acquire("s1", "r3", Duration::from_millis(100)).await.unwrap();
        assert_eq!(g3.run_id(), "r3");
    }
}
