//! Task definitions and results.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use reclaim_core::types::TaskId;
use reclaim_core::ToolType;
use serde::Serialize;

use crate::context::TaskContext;
use crate::resources::{ResourceId, ResourceLease};
use crate::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Scan,
    Delete,
}

/// What a body produces on success.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TaskOutput {
    /// Items found by a scan or removed by a delete.
    pub affected: u64,
    pub detail: serde_json::Value,
}

impl TaskOutput {
    /// Output reporting `affected` items and no detail.
    pub fn new(affected: u64) -> Self {
        Self {
            affected,
            detail: serde_json::Value::Null,
        }
    }

    /// Attach a structured detail payload.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Delivered to the submitter of a successful task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub tool: ToolType,
    pub kind: TaskKind,
    pub output: TaskOutput,
    pub duration_ms: u64,
}

pub(crate) type TaskBody =
    Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, Result<TaskOutput, TaskError>> + Send>;

/// A unit of work submitted on behalf of one tool.
pub struct Task {
    pub(crate) tool: ToolType,
    pub(crate) kind: TaskKind,
    pub(crate) cancelable: bool,
    pub(crate) requires: Vec<ResourceId>,
    pub(crate) lease: Option<ResourceLease>,
    pub(crate) body: TaskBody,
}

impl Task {
    /// Create a cancelable task with no lock requirements.
    pub fn new<F, Fut>(tool: ToolType, kind: TaskKind, body: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<TaskOutput, TaskError>> + Send + 'static,
    {
        Self {
            tool,
            kind,
            cancelable: true,
            requires: Vec::new(),
            lease: None,
            body: Box::new(move |ctx| body(ctx).boxed()),
        }
    }

    /// Declare a resource lock the task must hold while it runs.
    pub fn requires(mut self, resource: ResourceId) -> Self {
        if !self.requires.contains(&resource) {
            self.requires.push(resource);
        }
        self
    }

    /// Run inside a [`TaskManager::use_res`](crate::TaskManager::use_res)
    /// scope. Locks the lease already holds are not acquired again.
    pub fn within(mut self, lease: &ResourceLease) -> Self {
        self.lease = Some(lease.clone());
        self
    }

    /// Mark the task as ignoring cancellation requests while it runs.
    pub fn non_cancelable(mut self) -> Self {
        self.cancelable = false;
        self
    }

    /// The submitting tool.
    pub fn tool(&self) -> ToolType {
        self.tool
    }

    /// Whether the task scans or deletes.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Locks this task will queue for: its declared requirements minus
    /// those covered by its lease.
    pub(crate) fn locks_to_acquire(&self) -> Vec<ResourceId> {
        self.requires
            .iter()
            .filter(|r| !self.lease.as_ref().is_some_and(|l| l.covers(r)))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("tool", &self.tool)
            .field("kind", &self.kind)
            .field("cancelable", &self.cancelable)
            .field("requires", &self.requires)
            .field("within_lease", &self.lease.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(tool: ToolType) -> Task {
        Task::new(tool, TaskKind::Scan, |_ctx| async { Ok(TaskOutput::default()) })
    }

    #[test]
    fn duplicate_requirements_collapse() {
        let storage = ResourceId::new("storage");
        let task = noop(ToolType::AppCleaner)
            .requires(storage.clone())
            .requires(storage.clone());
        assert_eq!(task.locks_to_acquire(), vec![storage]);
    }

    #[test]
    fn defaults_to_cancelable() {
        assert!(noop(ToolType::SystemCleaner).cancelable);
        assert!(!noop(ToolType::SystemCleaner).non_cancelable().cancelable);
    }
}
