//! Per-tool task orchestration.
//!
//! [`TaskManager`] accepts at most one active task per tool, serializes
//! tasks of different tools through named resource locks, and publishes
//! every lifecycle transition both as replay-latest state (`watch`) and
//! as ordered `tool.state_changed` events on the [`EventBus`].
//!
//! Each accepted task is driven by its own spawned driver: wait for the
//! locks, run the body in a child task, then release the locks and
//! record the terminal state. Cancellation is cooperative; a body that
//! ignores it for longer than the configured grace period is aborted.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use reclaim_core::types::TaskId;
use reclaim_core::ToolType;
use reclaim_events::bus::EVENT_TOOL_STATE_CHANGED;
use reclaim_events::{CoreEvent, EventBus};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::TaskManagerConfig;
use crate::context::TaskContext;
use crate::resources::{LockTable, Reservation, ResourceId, ResourceLease};
use crate::state::{Progress, TaskManagerState, TaskSummary, ToolState, ToolStatus};
use crate::task::{Task, TaskBody, TaskKind, TaskOutput, TaskResult};
use crate::TaskError;

type Outcome = Result<TaskResult, TaskError>;

/// Task orchestration for all tools. Cheap to clone.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: TaskManagerConfig,
    locks: Arc<LockTable>,
    slots: Mutex<BTreeMap<ToolType, Slot>>,
    state_tx: watch::Sender<TaskManagerState>,
    events: Arc<EventBus>,
    /// Parent of every task's cancellation token.
    shutdown: CancellationToken,
    next_run: AtomicU64,
}

#[derive(Default)]
struct Slot {
    status: ToolStatus,
    /// The run owning the slot; kept after the terminal state until the
    /// result has been handed over.
    run: Option<Run>,
}

struct Run {
    id: u64,
    cancel: CancellationToken,
}

impl TaskManager {
    /// Create a manager with a private event bus.
    pub fn new(config: TaskManagerConfig) -> Self {
        Self::with_event_bus(config, Arc::new(EventBus::default()))
    }

    /// Create a manager publishing its transitions on a shared bus.
    pub fn with_event_bus(config: TaskManagerConfig, events: Arc<EventBus>) -> Self {
        let slots: BTreeMap<ToolType, Slot> =
            ToolType::ALL.into_iter().map(|t| (t, Slot::default())).collect();
        let (state_tx, _) = watch::channel(TaskManagerState::default());

        Self {
            inner: Arc::new(Inner {
                config,
                locks: LockTable::new(),
                slots: Mutex::new(slots),
                state_tx,
                events,
                shutdown: CancellationToken::new(),
                next_run: AtomicU64::new(0),
            }),
        }
    }

    /// Replay-latest view over all tools.
    pub fn state(&self) -> watch::Receiver<TaskManagerState> {
        self.inner.state_tx.subscribe()
    }

    /// The current aggregated state.
    pub fn current(&self) -> TaskManagerState {
        self.inner.state_tx.borrow().clone()
    }

    /// Ordered stream of events from the attached bus.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    /// Accept `task` without waiting for it.
    ///
    /// The task's position in every lock queue is taken before this
    /// returns, so the order of `start` calls is the order in which
    /// contending tasks run.
    pub fn start(&self, task: Task) -> Result<TaskHandle, TaskError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(TaskError::Closed);
        }

        let locks = task.locks_to_acquire();
        let Task {
            tool,
            kind,
            cancelable,
            lease,
            body,
            ..
        } = task;
        let run_id = self.inner.next_run.fetch_add(1, Ordering::Relaxed);
        let task_id = TaskId::new_v4();
        let cancel = self.inner.shutdown.child_token();

        let reservation = {
            let mut slots = self.inner.slots();
            let slot = slots.entry(tool).or_default();
            if slot.status.state.is_active() {
                tracing::warn!(tool = %tool, state = slot.status.state.as_str(), "Tool is busy, rejecting task");
                return Err(TaskError::ToolBusy(tool));
            }

            slot.run = Some(Run {
                id: run_id,
                cancel: cancel.clone(),
            });
            slot.status = ToolStatus {
                state: ToolState::Queued,
                task_id: Some(task_id),
                kind: Some(kind),
                cancelable,
                progress: None,
                last_result: slot.status.last_result.take(),
                last_error: None,
            };
            let reservation = self.inner.locks.reserve(locks);
            self.inner.publish(&slots, tool, true);
            reservation
        };

        let (result_tx, result_rx) = oneshot::channel();
        let driver = Driver {
            inner: Arc::clone(&self.inner),
            tool,
            kind,
            task_id,
            run_id,
            cancel,
        };
        tokio::spawn(driver.run(reservation, lease, body, result_tx));

        Ok(TaskHandle {
            inner: Arc::clone(&self.inner),
            tool,
            task_id,
            run_id,
            result_rx,
        })
    }

    /// Run `task` to completion and return its result.
    ///
    /// The tool is back to [`ToolState::Idle`] when this returns.
    pub async fn submit(&self, task: Task) -> Result<TaskResult, TaskError> {
        self.start(task)?.result().await
    }

    /// Request cancellation of the active task of `tool`.
    ///
    /// Returns `false` when the tool has no active task or its running
    /// task is not cancelable.
    pub fn cancel(&self, tool: ToolType) -> bool {
        let mut slots = self.inner.slots();
        let Some(slot) = slots.get_mut(&tool) else {
            return false;
        };
        let Some(run) = slot.run.as_ref() else {
            return false;
        };

        match slot.status.state {
            ToolState::Queued => {}
            ToolState::Running if slot.status.cancelable => {}
            ToolState::Running => {
                tracing::warn!(tool = %tool, "Running task is not cancelable");
                return false;
            }
            ToolState::CancelRequested => return true,
            ToolState::Idle | ToolState::Completed | ToolState::Failed => return false,
        }

        run.cancel.cancel();
        slot.status.state = ToolState::CancelRequested;
        tracing::info!(tool = %tool, task_id = ?slot.status.task_id, "Cancellation requested");
        self.inner.publish(&slots, tool, true);
        true
    }

    /// Hold `resources` for the duration of `block`.
    ///
    /// Tasks started [`within`](Task::within) the lease passed to
    /// `block` skip the locks it covers. The locks are released once
    /// `block` has finished and every task started within the lease is
    /// done.
    pub async fn use_res<F, Fut, T>(
        &self,
        resources: impl IntoIterator<Item = ResourceId>,
        block: F,
    ) -> Result<T, TaskError>
    where
        F: FnOnce(ResourceLease) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut reservation = self.inner.locks.reserve(resources);
        tokio::select! {
            biased;
            () = self.inner.shutdown.cancelled() => return Err(TaskError::Closed),
            () = reservation.granted() => {}
        }

        let lease = ResourceLease::new(reservation);
        tracing::debug!(resources = ?lease.resources(), "Resource scope entered");
        let output = block(lease.clone()).await;
        tracing::debug!(resources = ?lease.resources(), "Resource scope left");
        Ok(output)
    }

    /// Cancel every task and refuse new ones.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down task manager");
        self.inner.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// TaskHandle
// ---------------------------------------------------------------------------

/// Handle to a task accepted by [`TaskManager::start`].
///
/// Dropping the handle does not cancel the task. A finished tool returns
/// to idle as soon as the handle is gone, whether or not the result was
/// collected.
pub struct TaskHandle {
    inner: Arc<Inner>,
    tool: ToolType,
    task_id: TaskId,
    run_id: u64,
    result_rx: oneshot::Receiver<Outcome>,
}

impl TaskHandle {
    /// Identifier assigned to the task on acceptance.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// The tool that submitted the task.
    pub fn tool(&self) -> ToolType {
        self.tool
    }

    /// Wait for the task to finish. Returns the tool to idle.
    pub async fn result(mut self) -> Result<TaskResult, TaskError> {
        let result = (&mut self.result_rx)
            .await
            .unwrap_or(Err(TaskError::Closed));
        drop(self);
        result
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        // No-op while the task is still active; the driver resets the
        // slot itself when it finds the handle gone.
        self.inner.reset(self.tool, self.run_id);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("tool", &self.tool)
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct Driver {
    inner: Arc<Inner>,
    tool: ToolType,
    kind: TaskKind,
    task_id: TaskId,
    run_id: u64,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(
        self,
        mut reservation: Reservation,
        lease: Option<ResourceLease>,
        body: TaskBody,
        result_tx: oneshot::Sender<Outcome>,
    ) {
        let started = Instant::now();
        let outcome = self.execute(&mut reservation, body).await;
        drop(reservation);
        drop(lease);

        let result = outcome.map(|output| TaskResult {
            task_id: self.task_id,
            tool: self.tool,
            kind: self.kind,
            output,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        match &result {
            Ok(r) => tracing::info!(
                tool = %self.tool,
                task_id = %self.task_id,
                affected = r.output.affected,
                duration_ms = r.duration_ms,
                "Task completed",
            ),
            Err(e) => tracing::warn!(
                tool = %self.tool,
                task_id = %self.task_id,
                error = %e,
                "Task failed",
            ),
        }

        self.inner.finish(self.tool, self.run_id, &result);
        if result_tx.send(result).is_err() {
            // Nobody waits for the result.
            self.inner.reset(self.tool, self.run_id);
        }
    }

    async fn execute(
        &self,
        reservation: &mut Reservation,
        body: TaskBody,
    ) -> Result<TaskOutput, TaskError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(TaskError::Cancelled),
            () = reservation.granted() => {}
        }

        self.inner.update(self.tool, self.run_id, |status| {
            if status.state == ToolState::Queued {
                status.state = ToolState::Running;
            }
        });

        let ctx = TaskContext::new(
            Arc::clone(&self.inner),
            self.tool,
            self.task_id,
            self.run_id,
            self.cancel.clone(),
        );
        // Build the future inside the child task so a closure that panics
        // before returning it is caught like any other panic.
        let mut join = tokio::spawn(async move { body(ctx).await });

        tokio::select! {
            joined = &mut join => joined.unwrap_or_else(|e| Err(join_error(e))),
            () = cancel_deadline(&self.cancel, self.inner.config.cancel_grace) => {
                join.abort();
                // The abort lands at the body's next suspension point; the
                // locks stay held until then.
                let _ = join.await;
                let grace_ms = self
                    .inner
                    .config
                    .cancel_grace
                    .map_or(0, |g| g.as_millis() as u64);
                tracing::error!(
                    tool = %self.tool,
                    task_id = %self.task_id,
                    grace_ms,
                    "Task ignored cancellation, aborting it",
                );
                Err(TaskError::CancellationTimedOut { tool: self.tool, grace_ms })
            }
        }
    }
}

/// Resolves `grace` after cancellation was requested; never without a
/// grace period.
async fn cancel_deadline(cancel: &CancellationToken, grace: Option<Duration>) {
    cancel.cancelled().await;
    match grace {
        Some(grace) => tokio::time::sleep(grace).await,
        None => std::future::pending().await,
    }
}

fn join_error(e: JoinError) -> TaskError {
    if !e.is_panic() {
        return TaskError::Cancelled;
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    TaskError::Panicked(message)
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl Inner {
    fn slots(&self) -> MutexGuard<'_, BTreeMap<ToolType, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the status of `tool` if `run_id` still owns the slot.
    fn update(&self, tool: ToolType, run_id: u64, f: impl FnOnce(&mut ToolStatus)) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&tool) else {
            return;
        };
        if slot.run.as_ref().map(|r| r.id) != Some(run_id) {
            return;
        }
        let before = slot.status.state;
        f(&mut slot.status);
        let transitioned = slot.status.state != before;
        self.publish(&slots, tool, transitioned);
    }

    pub(crate) fn set_progress(&self, tool: ToolType, run_id: u64, progress: Progress) {
        self.update(tool, run_id, |status| status.progress = Some(progress));
    }

    fn finish(&self, tool: ToolType, run_id: u64, result: &Outcome) {
        self.update(tool, run_id, |status| {
            status.progress = None;
            match result {
                Ok(r) => {
                    status.state = ToolState::Completed;
                    status.last_error = None;
                    status.last_result = Some(TaskSummary {
                        task_id: r.task_id,
                        kind: r.kind,
                        affected: r.output.affected,
                        duration_ms: r.duration_ms,
                    });
                }
                Err(e) => {
                    status.state = ToolState::Failed;
                    status.last_error = Some(e.to_string());
                }
            }
        });
    }

    /// Return a finished tool to idle.
    fn reset(&self, tool: ToolType, run_id: u64) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&tool) else {
            return;
        };
        if slot.run.as_ref().map(|r| r.id) != Some(run_id) || slot.status.state.is_active() {
            return;
        }
        slot.run = None;
        slot.status.state = ToolState::Idle;
        slot.status.cancelable = false;
        self.publish(&slots, tool, true);
    }

    /// Publish the aggregated state; with `transitioned`, also log and
    /// emit the new state of `tool`. Called with the slot lock held so
    /// transitions reach subscribers in order.
    fn publish(&self, slots: &BTreeMap<ToolType, Slot>, tool: ToolType, transitioned: bool) {
        let tools = slots
            .iter()
            .map(|(t, slot)| (*t, slot.status.clone()))
            .collect();
        self.state_tx.send_replace(TaskManagerState::from_tools(tools));

        if !transitioned {
            return;
        }
        let Some(status) = slots.get(&tool).map(|s| &s.status) else {
            return;
        };
        tracing::info!(
            tool = %tool,
            task_id = ?status.task_id,
            state = status.state.as_str(),
            "Tool state changed",
        );
        self.events.publish(
            CoreEvent::new(EVENT_TOOL_STATE_CHANGED)
                .with_tool(tool)
                .with_payload(serde_json::json!({
                    "state": status.state,
                    "task_id": status.task_id,
                    "kind": status.kind,
                    "error": status.last_error,
                })),
        );
    }
}
