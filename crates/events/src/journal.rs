//! Tracing sink for the event bus.

use tokio::sync::broadcast::{self, error::RecvError};

use crate::bus::CoreEvent;

/// Logs every event published on an [`EventBus`](crate::EventBus).
///
/// Spawn [`EventJournal::run`] with a fresh subscription; it returns once
/// the bus is dropped.
pub struct EventJournal;

impl EventJournal {
    /// Journal events until the bus closes. Returns how many were logged.
    pub async fn run(mut events: broadcast::Receiver<CoreEvent>) -> u64 {
        let mut journaled = 0u64;
        let mut last_seq = 0u64;

        loop {
            match events.recv().await {
                Ok(event) => {
                    if last_seq != 0 && event.seq != last_seq + 1 {
                        tracing::warn!(
                            expected = last_seq + 1,
                            got = event.seq,
                            "Event journal has a gap",
                        );
                    }
                    last_seq = event.seq;
                    Self::record(&event);
                    journaled += 1;
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event journal fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }

        tracing::debug!(journaled, "Event journal stopped");
        journaled
    }

    fn record(event: &CoreEvent) {
        let tool = event.tool.map(|t| t.as_str()).unwrap_or("-");
        tracing::info!(
            seq = event.seq,
            event_type = %event.event_type,
            tool,
            payload = %event.payload,
            "Event",
        );
    }
}
