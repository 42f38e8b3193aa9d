//! Published per-tool lifecycle state.

use std::collections::BTreeMap;

use reclaim_core::types::TaskId;
use reclaim_core::ToolType;
use serde::Serialize;

use crate::task::TaskKind;

/// Lifecycle of one tool.
///
/// `Idle -> Queued -> Running -> Completed | Failed`, with
/// `CancelRequested` between `Running` (or `Queued`) and the terminal
/// state. Terminal states return to `Idle` once the submitter has the
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    #[default]
    Idle,
    Queued,
    Running,
    CancelRequested,
    Completed,
    Failed,
}

impl ToolState {
    /// Whether a task currently occupies the tool.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::CancelRequested)
    }

    /// Wire name, as used in events and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::CancelRequested => "cancel_requested",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Progress reported by a running body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    /// Human-readable description of the current step.
    pub primary: Option<String>,
    pub current: u64,
    /// `0` when the amount of work is unknown.
    pub max: u64,
}

impl Progress {
    /// Indeterminate progress with a headline.
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: Some(primary.into()),
            ..Self::default()
        }
    }

    /// Attach a `current` of `max` counter.
    pub fn with_count(mut self, current: u64, max: u64) -> Self {
        self.current = current;
        self.max = max;
        self
    }

    /// True while no counter is attached.
    pub fn is_indeterminate(&self) -> bool {
        self.max == 0
    }
}

/// Outcome of the last task of a tool that completed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub kind: TaskKind,
    /// Items found by a scan or removed by a delete.
    pub affected: u64,
    pub duration_ms: u64,
}

/// Observable status of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ToolStatus {
    pub state: ToolState,
    /// The occupying (or last finished) task.
    pub task_id: Option<TaskId>,
    pub kind: Option<TaskKind>,
    pub cancelable: bool,
    pub progress: Option<Progress>,
    pub last_result: Option<TaskSummary>,
    pub last_error: Option<String>,
}

/// Aggregated view over all tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskManagerState {
    pub tools: BTreeMap<ToolType, ToolStatus>,
    /// Whether any tool has an active task.
    pub any_running: bool,
}

impl TaskManagerState {
    pub(crate) fn from_tools(tools: BTreeMap<ToolType, ToolStatus>) -> Self {
        let any_running = tools.values().any(|s| s.state.is_active());
        Self { tools, any_running }
    }

    /// Status of `tool`; idle when the tool never ran.
    pub fn tool(&self, tool: ToolType) -> ToolStatus {
        self.tools.get(&tool).cloned().unwrap_or_default()
    }

    /// Lifecycle state of `tool`.
    pub fn state_of(&self, tool: ToolType) -> ToolState {
        self.tools.get(&tool).map(|s| s.state).unwrap_or_default()
    }
}

impl Default for TaskManagerState {
    fn default() -> Self {
        Self::from_tools(
            ToolType::ALL
                .into_iter()
                .map(|t| (t, ToolStatus::default()))
                .collect(),
        )
    }
}
