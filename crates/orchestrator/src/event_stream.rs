//! Component 5: the bounded, ordered, single-producer/single-consumer
//! event stream with backpressure (§4.5). A hand-rolled ring rather
//! than a bare `tokio::sync::mpsc::channel` because the required
//! hysteresis — block the producer at `capacity`, resume only once the
//! consumer has drained below the low-water mark (half capacity) —
//! isn't expressible with a plain bounded channel's single threshold.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use sa_domain::{AgentEvent, Error};

struct State {
    queue: VecDeque<AgentEvent>,
    closed: bool,
    error: Option<Error>,
}

struct Inner {
    state: Mutex<State>,
    capacity: usize,
    low_water: usize,
    space_available: Notify,
    item_available: Notify,
}

/// The producer half, held exclusively by the Runner task for a run.
#[derive(Clone)]
pub struct EventStreamProducer {
    inner: Arc<Inner>,
}

/// The consumer half, handed to the caller as part of `RunHandle`.
pub struct EventStreamConsumer {
    inner: Arc<Inner>,
}

/// Create a linked producer/consumer pair with the given buffer size.
/// `low_water` is half of `capacity`, rounded down, minimum 1.
pub fn channel(capacity: usize) -> (EventStreamProducer, EventStreamConsumer) {
    let capacity = capacity.max(1);
    let low_water = (capacity / 2).max(1);
    let inner = Arc::new(Inner {
        state: Mutex::new(State { queue: VecDeque::new(), closed: false, error: None }),
        capacity,
        low_water,
        space_available: Notify::new(),
        item_available: Notify::new(),
    });
    (EventStreamProducer { inner: inner.clone() }, EventStreamConsumer { inner })
}

impl EventStreamProducer {
    /// Emit an event, suspending if the buffer is saturated until the
    /// consumer drains below the low-water mark. Events are never
    /// dropped. A no-op (returns immediately) once the stream is closed.
    pub async fn emit(&self, event: AgentEvent) {
        loop {
            {
                let mut st = self.inner.state.lock();
                if st.closed {
                    return;
                }
                if st.queue.len() < self.inner.capacity {
                    st.queue.push_back(event);
                    drop(st);
                    self.inner.item_available.notify_one();
                    return;
                }
            }
            self.wait_for_drain().await;
        }
    }

    async fn wait_for_drain(&self) {
        loop {
            let notified = self.inner.space_available.notified();
            {
                let st = self.inner.state.lock();
                if st.closed || st.queue.len() < self.inner.low_water {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Unblock all waiters and signal end-of-stream.
    pub fn close(&self) {
        let mut st = self.inner.state.lock();
        st.closed = true;
        drop(st);
        self.inner.item_available.notify_waiters();
        self.inner.space_available.notify_waiters();
    }

    /// Close and surface `err` to the consumer on its next read.
    pub fn set_error(&self, err: Error) {
        let mut st = self.inner.state.lock();
        st.closed = true;
        st.error = Some(err);
        drop(st);
        self.inner.item_available.notify_waiters();
        self.inner.space_available.notify_waiters();
    }

    pub fn depth(&self) -> usize {
        self.inner.state.lock().queue.len()
    }
}

impl EventStreamConsumer {
    /// Pull the next item. `None` means the stream has ended (closed
    /// and drained, with no stored error). The stored error, if any,
    /// surfaces exactly once as `Some(Err(_))` after the queue drains.
    pub async fn next_event(&mut self) -> Option<Result<AgentEvent, Error>> {
        loop {
            {
                let mut st = self.inner.state.lock();
                if let Some(event) = st.queue.pop_front() {
                    let should_wake_producer = st.queue.len() < self.inner.low_water;
                    drop(st);
                    if should_wake_producer {
                        self.inner.space_available.notify_waiters();
                    }
                    return Some(Ok(event));
                }
                if st.closed {
                    if let Some(err) = st.error.take() {
                        return Some(Err(err));
                    }
                    return None;
                }
            }
            self.inner.item_available.notified().await;
        }
    }

    pub fn depth(&self) -> usize {
        self.inner.state.lock().queue.len()
    }
}
