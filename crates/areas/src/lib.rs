//! Storage-area discovery and caching.
//!
//! - [`AreaFactory`]: pluggable discovery strategy producing areas.
//! - [`StaticAreaFactory`]: factory serving a fixed, configured table.
//! - [`AreaManager`]: single-flight recomputation of the area snapshot,
//!   published to any number of observers.

pub mod factory;
pub mod manager;
pub mod subscription;

pub use factory::{AreaFactory, FactoryError, StaticAreaFactory};
pub use manager::AreaManager;
pub use subscription::{LatestState, StateSubscription};

/// Errors surfaced on the area state stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AreaError {
    #[error("Area recomputation {generation} failed in factory '{factory}': {message}")]
    RecomputationFailed {
        generation: u64,
        factory: String,
        message: String,
    },

    #[error("Area manager has shut down")]
    Closed,
}
