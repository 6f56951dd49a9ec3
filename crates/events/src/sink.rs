//! Single-consumer event delivery.
//!
//! The host attaches at most one listener to the event stream. Delivery
//! is at-most-once and best-effort: events emitted while no listener is
//! attached are discarded, never buffered or replayed. Geofence events
//! are advisory, not transactional.

use crate::TransitionEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Consumer of the transition-event stream.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block the emitter.
    fn deliver(&self, event: TransitionEvent);
}

/// Holds the single active consumer and fans events into it.
///
/// Attaching replaces any existing consumer; it never appends.
#[derive(Default)]
pub struct SinkManager {
    consumer: Mutex<Option<Arc<dyn EventSink>>>,
}

impl SinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a consumer, replacing the previous one atomically.
    pub fn attach(&self, consumer: Arc<dyn EventSink>) {
        *self.consumer.lock().expect("sink mutex poisoned") = Some(consumer);
        tracing::debug!("event listener attached");
    }

    /// Clear the consumer. Subsequent events are discarded.
    pub fn detach(&self) {
        *self.consumer.lock().expect("sink mutex poisoned") = None;
        tracing::debug!("event listener detached");
    }

    pub fn is_attached(&self) -> bool {
        self.consumer.lock().expect("sink mutex poisoned").is_some()
    }

    /// Deliver to the current consumer, or discard when none is attached.
    pub fn emit(&self, event: TransitionEvent) {
        // Clone the handle out so delivery runs outside the lock.
        let consumer = self.consumer.lock().expect("sink mutex poisoned").clone();
        match consumer {
            Some(consumer) => consumer.deliver(event),
            None => tracing::debug!(?event, "no event listener, discarding"),
        }
    }
}

/// In-memory sink for tests: captures everything delivered to it.
#[derive(Default)]
pub struct InMemorySink {
    events: Mutex<Vec<TransitionEvent>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }

    pub fn errors(&self) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .iter()
            .filter(|e| e.is_error())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().expect("sink mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().expect("sink mutex poisoned").is_empty()
    }
}

impl EventSink for InMemorySink {
    fn deliver(&self, event: TransitionEvent) {
        self.events.lock().expect("sink mutex poisoned").push(event);
    }
}

/// Sink bridging the stream onto a bounded async channel.
///
/// Delivery uses `try_send` so the emitter never blocks; when the
/// consumer lags behind the channel capacity, new events are dropped
/// and counted.
pub struct ChannelSink {
    tx: mpsc::Sender<TransitionEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and the receiver the host consumes.
    pub fn bounded(capacity: usize) -> (Arc<Self>, mpsc::Receiver<TransitionEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Arc::new(Self {
                tx,
                dropped: AtomicU64::new(0),
            }),
            rx,
        )
    }

    /// Number of events dropped because the channel was full or closed.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: TransitionEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("event channel closed");
            }
        }
    }
}
