//! Component 6: the priority admission queue (§4.6). Reworked around
//! `(–priority, enqueuedAt)` ordering and a running-set cap, with a
//! `Notify` for admission wake-ups instead of a polling loop (§9 open
//! question).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// `{runId, sessionId, priority, enqueuedAt}` (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub run_id: String,
    pub session_id: String,
    pub priority: i64,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: usize,
    pub capacity: usize,
}

struct State {
    queued: Vec<QueueItem>,
    running: HashSet<String>,
}

pub struct AdmissionQueue {
    state: Mutex<State>,
    capacity: usize,
    notify: Notify,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State { queued: Vec::new(), running: HashSet::new() }),
            capacity: capacity.max(1),
            notify: Notify::new(),
        }
    }

    /// Insert maintaining `(–priority, enqueuedAt)` order; ties broken
    /// by insertion order (stable sort).
    pub fn enqueue(&self, run_id: String, session_id: String, priority: i64) {
        let item = QueueItem { run_id, session_id, priority, enqueued_at: Utc::now() };
        let mut st = self.state.lock();
        let pos = st
            .queued
            .binary_search_by(|existing| cmp_priority_then_time(existing, &item))
            .unwrap_or_else(|e| e);
        st.queued.insert(pos, item);
        drop(st);
        self.notify.notify_waiters();
    }

    /// If `|running| < capacity`, pop and return the head item and add
    /// it to the running set; else `None`.
    pub fn dequeue(&self) -> Option<QueueItem> {
        let mut st = self.state.lock();
        if st.running.len() >= self.capacity || st.queued.is_empty() {
            return None;
        }
        let item = st.queued.remove(0);
        st.running.insert(item.run_id.clone());
        Some(item)
    }

    /// Wait until admission is possible for `run_id`, then return it
    /// dequeued. Uses `Notify` rather than a polling sleep.
    pub async fn wait_for_admission(&self, run_id: &str) -> QueueItem {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_dequeue_specific(run_id) {
                return item;
            }
            notified.await;
            if let Some(item) = self.try_dequeue_specific(run_id) {
                return item;
            }
        }
    }

    fn try_dequeue_specific(&self, run_id: &str) -> Option<QueueItem> {
        let mut st = self.state.lock();
        if st.running.len() >= self.capacity {
            return None;
        }
        let head_is_target = st.queued.first().map(|i| i.run_id == run_id).unwrap_or(false);
        if !head_is_target {
            return None;
        }
        let item = st.queued.remove(0);
        st.running.insert(item.run_id.clone());
        Some(item)
    }

    pub fn complete(&self, run_id: &str) {
        let mut st = self.state.lock();
        st.running.remove(run_id);
        drop(st);
        self.notify.notify_waiters();
    }

    /// Remove from the queued set (not the running set). Returns
    /// whether it was present.
    pub fn remove(&self, run_id: &str) -> bool {
        let mut st = self.state.lock();
        let before = st.queued.len();
        st.queued.retain(|i| i.run_id != run_id);
        let removed = st.queued.len() != before;
        drop(st);
        if removed {
            self.notify.notify_waiters();
        }
        removed
    }

    /// 1-based position in the queue, or `None` if not queued.
    pub fn position(&self, run_id: &str) -> Option<usize> {
        let st = self.state.lock();
        st.queued.iter().position(|i| i.run_id == run_id).map(|idx| idx + 1)
    }

    pub fn is_running(&self, run_id: &str) -> bool {
        self.state.lock().running.contains(run_id)
    }

    pub fn is_queued(&self, run_id: &str) -> bool {
        self.state.lock().queued.iter().any(|i| i.run_id == run_id)
    }

    pub fn status(&self) -> QueueStatus {
        let st = self.state.lock();
        QueueStatus { queued: st.queued.len(), running: st.running.len(), capacity: self.capacity }
    }
}

fn cmp_priority_then_time(a: &QueueItem, b: &QueueItem) -> std::cmp::Ordering {
    b.priority.cmp(&a.priority).then(a.enqueued_at.cmp(&b.enqueued_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dequeue_respects_capacity() {
        let q = AdmissionQueue::new(1);
        q.enqueue("r1".into(), "s1".into(), 0);
        q.enqueue("r2".into(), "s2".into(), 0);

        let first = q.dequeue().unwrap();
        assert_eq!(first.run_id, "r1");
        assert!(q.dequeue().is_none(), "capacity is exhausted");

        q.complete("r1");
        let second = q.dequeue().unwrap();
        assert_eq!(second.run_id, "r2");
    }

    #[test]
    fn higher_priority_dequeues_first() {
        let q = AdmissionQueue::new(1);
        q.enqueue("r0".into(), "s0".into(), 0);
        q.dequeue(); // r0 now running, queue empty

        q.enqueue("r1".into(), "s1".into(), 0);
        q.enqueue("r2".into(), "s2".into(), 10);
        q.enqueue("r3".into(), "s3".into(), 5);

        q.complete("r0");
        assert_eq!(q.dequeue().unwrap().run_id, "r2");
        assert_eq!(q.dequeue().unwrap().run_id, "r3");
        assert_eq!(q.dequeue().unwrap().run_id, "r1");
    }

    #[test]
    fn equal_priority_ties_broken_by_enqueue_order() {
        let q = AdmissionQueue::new(5);
        q.enqueue("r1".into(), "s".into(), 0);
        q.enqueue("r2".into(), "s".into(), 0);
        q.enqueue("r3".into(), "s".into(), 0);
        assert_eq!(q.dequeue().unwrap().run_id, "r1");
        assert_eq!(q.dequeue().unwrap().run_id, "r2");
        assert_eq!(q.dequeue().unwrap().run_id, "r3");
    }

    #[test]
    fn remove_from_queued_reports_presence() {
        let q = AdmissionQueue::new(5);
        q.enqueue("r1".into(), "s".into(), 0);
        assert!(q.remove("r1"));
        assert!(!q.remove("r1"));
    }

    #[test]
    fn position_and_status_reflect_state() {
        let q = AdmissionQueue::new(2);
        q.enqueue("r1".into(), "s".into(), 0);
        q.enqueue("r2".into(), "s".into(), 0);
        assert_eq!(q.position("r1"), Some(1));
        assert_eq!(q.position("r2"), Some(2));
        let status = q.status();
        assert_eq!(status.queued, 2);
        assert_eq!(status.capacity, 2);
    }

    #[tokio::test]
    async fn wait_for_admission_resolves_once_capacity_and_turn_arrive() {
        let q = std::sync::Arc::new(AdmissionQueue::new(1));
        q.enqueue("r0".into(), "s0".into(), 0);
        q.dequeue();
        q.enqueue("r1".into(), "s1".into(), 0);

        let q2 = q.clone();
        let waiter = tokio::spawn(async move { q2.wait_for_admission("r1").await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        q.complete("r0");
        let item = tokio::time::timeout(std::time::Duration::from_millis(200), waiter).await.unwrap().unwrap();
        assert_eq!(item.run_id, "r1");
        assert!(q.is_running("r1"));
    }
}
