//! Bounded progress event bus.
//!
//! Download tasks publish progress through a bounded channel that never
//! blocks: when the consumer falls behind, new events are discarded and
//! counted instead of stalling a download. A summary line is logged for
//! every hundred discarded events so silent loss is visible.

use crate::config::{EVENT_BUS_CAPACITY, EVENT_DRAIN_BATCH, EVENT_DROP_SUMMARY_EVERY};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Events published during a run.
///
/// Serialized with a `kind` tag so out-of-process UI consumers can dispatch
/// without knowing the full enum.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// A course started processing
    CourseStarted {
        /// Course title
        title: String,
    },
    /// A course finished, successfully or not
    CourseFinished {
        /// Course title
        title: String,
        /// Whether at least one item succeeded or was already complete
        succeeded: bool,
    },
    /// An item download started
    ItemStarted {
        /// Stable item id
        id: String,
        /// Display name for UIs
        name: String,
    },
    /// Streaming progress for an in-flight item, throttled to the
    /// configured cadence
    ItemProgress {
        /// Stable item id
        id: String,
        /// Bytes written so far
        downloaded: u64,
        /// Total size from Content-Length, when the server sent one
        total: Option<u64>,
        /// Smoothed transfer rate in bytes per second
        bytes_per_sec: f64,
    },
    /// An item finished downloading and verifying
    ItemCompleted {
        /// Stable item id
        id: String,
        /// Final artifact size
        bytes: u64,
    },
    /// An item failed after all retries
    ItemFailed {
        /// Stable item id
        id: String,
        /// Human-readable failure reason
        reason: String,
    },
    /// An item was skipped because the ledger already has it
    ItemSkipped {
        /// Stable item id
        id: String,
    },
    /// Synthetic summary published after every hundred discarded events
    DropSummary {
        /// Cumulative events discarded so far
        dropped: u64,
    },
}

/// Create a connected publisher/consumer pair with the standard capacity.
pub fn bus() -> (EventPublisher, EventConsumer) {
    bus_with_capacity(EVENT_BUS_CAPACITY)
}

/// Create a bus with an explicit capacity.
pub fn bus_with_capacity(capacity: usize) -> (EventPublisher, EventConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    let publisher = EventPublisher {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (publisher, EventConsumer { rx })
}

/// Cloneable, non-blocking sending half of the bus.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<ProgressEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventPublisher {
    /// Publish an event. Never blocks: if the bus is full the event is
    /// discarded (drop-newest) and counted.
    pub fn publish(&self, event: ProgressEvent) {
        if self.tx.try_send(event).is_err() {
            metrics::counter!("progress_events_dropped_total").increment(1);
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped % EVENT_DROP_SUMMARY_EVERY == 0 {
                warn!(dropped, "Progress events discarded on full bus");
                // Best effort: the bus may well still be full
                let _ = self.tx.try_send(ProgressEvent::DropSummary { dropped });
            }
        }
    }

    /// Total events discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consuming half of the bus.
pub struct EventConsumer {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl EventConsumer {
    /// Drain up to a bounded batch of pending events without waiting.
    ///
    /// The batch cap keeps a UI poll from monopolizing its own repaint loop
    /// when the bus is backed up.
    pub fn poll(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while events.len() < EVENT_DRAIN_BATCH {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        events
    }

    /// Wait for the next event. Returns `None` once every publisher is gone
    /// and the bus is drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }
}
