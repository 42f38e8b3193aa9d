//! Top-level affordances derived from area and task state.

use reclaim_core::AreaSnapshot;
use reclaim_tasks::{TaskKind, TaskManagerState, ToolState};
use serde::Serialize;

/// The primary action offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MainAction {
    Scan,
    Delete,
    /// Work is in progress and cannot be cancelled.
    Working,
    /// Work is in progress and can be cancelled.
    WorkingCancelable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overview {
    /// Areas were computed and none were found.
    pub needs_area_setup: bool,
    pub main_action: MainAction,
    pub any_running: bool,
}

impl Overview {
    /// `cached` is the last good snapshot, if one was ever computed.
    pub fn derive(cached: Option<&AreaSnapshot>, tasks: &TaskManagerState) -> Self {
        Self {
            needs_area_setup: cached.is_some_and(AreaSnapshot::is_empty),
            main_action: main_action(tasks),
            any_running: tasks.any_running,
        }
    }
}

fn main_action(tasks: &TaskManagerState) -> MainAction {
    let statuses = tasks.tools.values();

    if statuses
        .clone()
        .any(|s| s.state == ToolState::Running && s.cancelable)
    {
        return MainAction::WorkingCancelable;
    }
    if statuses.clone().any(|s| s.state.is_active()) {
        return MainAction::Working;
    }

    let has_deletable = statuses.filter_map(|s| s.last_result.as_ref()).any(|r| {
        r.kind == TaskKind::Scan && r.affected > 0
    });
    if has_deletable {
        MainAction::Delete
    } else {
        MainAction::Scan
    }
}
