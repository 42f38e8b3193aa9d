//! Classification scan run by the corpse finder.
//!
//! Resolves a list of paths to their owning areas inside a task that
//! holds the shared storage lock, so no other tool modifies storage
//! while the scan looks at it.

use std::path::PathBuf;
use std::sync::Arc;

use reclaim_areas::{AreaError, AreaManager};
use reclaim_core::{AreaInfo, AreaSnapshot, ToolType};
use reclaim_forensics::JurisdictionResolver;
use reclaim_tasks::{
    Progress, ResourceId, Task, TaskContext, TaskError, TaskKind, TaskManager, TaskOutput,
    TaskResult,
};
use serde::Serialize;

/// Name of the lock guarding storage modifications.
pub const STORAGE_LOCK: &str = "filesystem-write-access";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Areas(#[from] AreaError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Ownership of one scanned path.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub path: PathBuf,
    /// `None` when no area owns the path.
    pub owner: Option<AreaInfo>,
}

impl Classification {
    /// Owned by an area and not protected.
    pub fn is_deletable(&self) -> bool {
        self.owner.as_ref().is_some_and(|o| !o.is_protected)
    }
}

/// Classify `paths` as a corpse-finder scan.
///
/// The scan's `affected` count is the number of deletable paths; the
/// per-path classifications are in the output detail.
pub async fn run_classification_scan(
    tasks: &TaskManager,
    areas: &AreaManager,
    resolver: Arc<JurisdictionResolver>,
    paths: Vec<PathBuf>,
) -> Result<TaskResult, ScanError> {
    let snapshot = areas.current_areas().await?;
    tracing::info!(
        generation = snapshot.generation(),
        area_count = snapshot.len(),
        path_count = paths.len(),
        "Starting classification scan",
    );

    let storage = ResourceId::new(STORAGE_LOCK);
    let scoped = tasks.clone();
    let result = tasks
        .use_res([storage.clone()], |lease| async move {
            let task = Task::new(ToolType::CorpseFinder, TaskKind::Scan, move |ctx| {
                classify_all(ctx, resolver, snapshot, paths)
            })
            .requires(storage)
            .within(&lease);
            scoped.submit(task).await
        })
        .await??;

    Ok(result)
}

async fn classify_all(
    ctx: TaskContext,
    resolver: Arc<JurisdictionResolver>,
    snapshot: Arc<AreaSnapshot>,
    paths: Vec<PathBuf>,
) -> Result<TaskOutput, TaskError> {
    let total = paths.len() as u64;
    let mut classified = Vec::with_capacity(paths.len());

    for (i, path) in paths.into_iter().enumerate() {
        ctx.checkpoint()?;
        ctx.update_progress(
            Progress::new(format!("Classifying {}", path.display()))
                .with_count(i as u64, total),
        );

        let owner = resolver.identify(&path, &snapshot);
        match &owner {
            Some(info) => tracing::debug!(
                path = %path.display(),
                area = %info.area,
                protected = info.is_protected,
                "Path classified",
            ),
            None => tracing::debug!(path = %path.display(), "Path has no owning area"),
        }
        classified.push(Classification { path, owner });

        tokio::task::yield_now().await;
    }

    let deletable = classified.iter().filter(|c| c.is_deletable()).count() as u64;
    let detail = serde_json::to_value(&classified)
        .map_err(|e| TaskError::Failed(format!("Failed to encode classifications: {e}")))?;
    Ok(TaskOutput::new(deletable).with_detail(detail))
}
