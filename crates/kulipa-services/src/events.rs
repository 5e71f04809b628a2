//! Event sinks
//!
//! Services publish a [`BillingEvent`] after each committed state change.
//! Sinks must not block or fail the publishing operation; notification
//! glue (email/SMS) subscribes through [`BroadcastEventSink`].

use kulipa_core::{models::BillingEvent, traits::EventSink};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::constants::EVENT_CHANNEL_CAPACITY;

/// Logs every event at `info`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: BillingEvent) {
        info!(
            event = event.name(),
            customer_id = event.customer_id(),
            "Billing event"
        );
    }
}

/// Fans events out to any number of async subscribers
///
/// Events published while nobody subscribes are dropped; a slow
/// subscriber that falls behind the channel capacity skips events.
pub struct BroadcastEventSink {
    sender: broadcast::Sender<BillingEvent>,
}

impl BroadcastEventSink {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BillingEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: BillingEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            debug!(event = name, "No event subscribers");
        }
    }
}

/// Keeps published events in memory
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<BillingEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BillingEvent> {
        self.events.lock().clone()
    }

    /// Names of the recorded events, in publish order
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(BillingEvent::name).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: BillingEvent) {
        self.events.lock().push(event);
    }
}
