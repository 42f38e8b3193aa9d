//! Reclaim event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`CoreEvent`]: the event envelope emitted by the area manager and
//!   the task manager.
//! - [`EventJournal`]: background service that logs every event.

pub mod bus;
pub mod journal;

pub use bus::{CoreEvent, EventBus};
pub use journal::EventJournal;
