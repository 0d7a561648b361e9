//! The read-only half of a run's cancel signal (§4.3, §9 "Cancellation
//! token"). `sa-orchestrator` owns the controller that creates and fires
//! these; this crate only owns the shape so that [`crate::traits::ExecCtx`]
//! can carry one into tool execution without `sa-domain` depending on the
//! orchestrator crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A cheaply-cloneable, read-only view of a run's cancellation flag.
///
/// Every blocking primitive a [`crate::traits::ToolExecutor`] awaits
/// (a subprocess, an HTTP call) should poll [`CancelSignal::is_cancelled`]
/// at natural yield points, or race it via [`CancelSignal::cancelled`] in
/// a `tokio::select!` alongside its own progress.
#[derive(Clone)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal").field("cancelled", &self.is_cancelled()).finish()
    }
}

impl CancelSignal {
    /// Build a signal backed by an existing flag and notifier — used by
    /// `sa-orchestrator`'s `CancelToken` to hand out a view onto the same
    /// underlying bit and wakeup without exposing its reason internals.
    pub fn from_parts(flag: Arc<AtomicBool>, notify: Arc<Notify>) -> Self {
        Self { flag, notify }
    }

    /// A signal that never fires — for tests and standalone tool calls
    /// made outside a run.
    pub fn never() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), notify: Arc::new(Notify::new()) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Resolves as soon as the signal fires, or immediately if it already
    /// has. Races against the notifier rather than polling, so a waiter
    /// wakes promptly instead of on the next poll tick.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_signal_is_never_cancelled() {
        assert!(!CancelSignal::never().is_cancelled());
    }

    #[test]
    fn from_parts_observes_external_mutation() {
        let flag = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let signal = CancelSignal::from_parts(flag.clone(), notify.clone());
        assert!(!signal.is_cancelled());
        flag.store(true, Ordering::Release);
        notify.notify_waiters();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_external_notify() {
        let flag = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let signal = CancelSignal::from_parts(flag.clone(), notify.clone());
        let waiter = signal.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        flag.store(true, Ordering::Release);
        notify.notify_waiters();
        tokio::time::timeout(std::time::Duration::from_millis(200), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancelled_future_resolves_immediately_if_already_cancelled() {
        let signal = CancelSignal::from_parts(Arc::new(AtomicBool::new(true)), Arc::new(Notify::new()));
        tokio::time::timeout(std::time::Duration::from_millis(50), signal.cancelled()).await.unwrap();
    }
}
