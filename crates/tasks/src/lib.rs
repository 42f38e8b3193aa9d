//! Task orchestration for the cleaning tools.
//!
//! - [`TaskManager`]: per-tool exclusivity, FIFO resource locks,
//!   cooperative cancellation with a grace timeout, aggregated state.
//! - [`Task`]: a unit of work submitted by one tool.
//! - [`TaskContext`]: handed to a running body for cancellation checks
//!   and progress reports.
//! - [`ResourceLease`]: the locks held by a [`TaskManager::use_res`]
//!   scope.

pub mod config;
pub mod context;
pub mod manager;
pub mod resources;
pub mod state;
pub mod task;

pub use config::TaskManagerConfig;
pub use context::TaskContext;
pub use manager::{TaskHandle, TaskManager};
pub use resources::{ResourceId, ResourceLease};
pub use state::{Progress, TaskManagerState, TaskSummary, ToolState, ToolStatus};
pub use task::{Task, TaskKind, TaskOutput, TaskResult};

use reclaim_core::ToolType;

/// Errors surfaced by task submission and execution.
///
/// `Clone` because terminal errors are also recorded in the published
/// [`TaskManagerState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Tool {0} already has an active task")]
    ToolBusy(ToolType),

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Task of {tool} ignored cancellation for {grace_ms}ms and was aborted")]
    CancellationTimedOut { tool: ToolType, grace_ms: u64 },

    #[error("Task failed: {0}")]
    Failed(String),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Task manager is shut down")]
    Closed,
}
