use std::sync::Arc;

use reclaim_core::types::TaskId;
use reclaim_core::ToolType;
use tokio_util::sync::CancellationToken;

use crate::manager::Inner;
use crate::state::Progress;
use crate::TaskError;

/// Handle given to a running task body.
///
/// Cancellation is cooperative: bodies poll [`checkpoint`](Self::checkpoint)
/// between units of work or race [`cancelled`](Self::cancelled) against
/// their own futures.
#[derive(Clone)]
pub struct TaskContext {
    inner: Arc<Inner>,
    tool: ToolType,
    task_id: TaskId,
    run_id: u64,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        inner: Arc<Inner>,
        tool: ToolType,
        task_id: TaskId,
        run_id: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            tool,
            task_id,
            run_id,
            cancel,
        }
    }

    /// The tool running this task.
    pub fn tool(&self) -> ToolType {
        self.tool
    }

    /// Identifier of the running task.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation of this task was requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// `Err(TaskError::Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.cancel.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Publish progress for this task's tool.
    pub fn update_progress(&self, progress: Progress) {
        self.inner.set_progress(self.tool, self.run_id, progress);
    }
}
