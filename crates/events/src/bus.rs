//! Ordered fan-out of core events.
//!
//! The area manager and the task manager publish [`CoreEvent`]s on a
//! shared [`EventBus`]; observers such as the
//! [`EventJournal`](crate::EventJournal) subscribe to it. The bus stamps
//! every event with a sequence number so observers can tell a gap
//! (lagging receiver) from a quiet period.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use reclaim_core::ToolType;
use serde::Serialize;
use tokio::sync::broadcast;

/// A recomputation generation published a new snapshot.
pub const EVENT_AREAS_RELOADED: &str = "areas.reloaded";

/// A recomputation generation failed.
pub const EVENT_AREAS_RELOAD_FAILED: &str = "areas.reload_failed";

/// A tool moved to a new lifecycle state.
pub const EVENT_TOOL_STATE_CHANGED: &str = "tool.state_changed";

/// Broadcast buffer used by [`EventBus::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct CoreEvent {
    /// Position in the bus order, assigned on publish. Starts at 1.
    pub seq: u64,
    /// One of the `EVENT_*` names.
    pub event_type: String,
    pub tool: Option<ToolType>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl CoreEvent {
    /// Create an event of `event_type` with a null payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            seq: 0,
            event_type: event_type.into(),
            tool: None,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Attribute the event to `tool`.
    pub fn with_tool(mut self, tool: ToolType) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Attach a JSON payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Broadcast hub shared as `Arc<EventBus>`.
///
/// A receiver falling more than `capacity` events behind loses the
/// oldest ones and sees `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
    /// Last assigned sequence number. Held while sending so sequence
    /// order and delivery order agree across publishers.
    seq: Mutex<u64>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            seq: Mutex::new(0),
        }
    }

    /// Stamp and broadcast `event`, returning its sequence number.
    ///
    /// Events published while nobody is subscribed are dropped.
    pub fn publish(&self, mut event: CoreEvent) -> u64 {
        let mut seq = self.seq.lock().unwrap_or_else(PoisonError::into_inner);
        *seq += 1;
        event.seq = *seq;
        if self.sender.send(event).is_err() {
            tracing::trace!(seq = *seq, "No event subscribers");
        }
        *seq
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
