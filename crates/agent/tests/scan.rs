//! Integration tests for the classification scan and the overview it
//! feeds.

use std::path::PathBuf;
use std::sync::Arc;

use assert_matches::assert_matches;
use reclaim_agent::config::AgentConfig;
use reclaim_agent::overview::{MainAction, Overview};
use reclaim_agent::scan::{run_classification_scan, ScanError, STORAGE_LOCK};
use reclaim_areas::{AreaFactory, AreaManager};
use reclaim_core::ToolType;
use reclaim_forensics::{default_processors, JurisdictionResolver};
use reclaim_tasks::{ResourceId, Task, TaskError, TaskKind, TaskManager, TaskOutput, ToolState};

const AREAS: &str = "SDCARD=/storage/emulated/0,\
                     PUBLIC_DATA=/storage/emulated/0/Android/data,\
                     APP_APP_PRIVATE=/data/app-private,\
                     VENDOR!=/vendor";

struct Fixture {
    areas: Arc<AreaManager>,
    tasks: TaskManager,
    resolver: Arc<JurisdictionResolver>,
}

fn fixture(table: &str) -> Fixture {
    let config = AgentConfig::from_lookup(|var| match var {
        "RECLAIM_AREAS" => Some(table.to_string()),
        _ => None,
    })
    .expect("valid config");

    let factories: Vec<Arc<dyn AreaFactory>> = vec![Arc::new(config.areas.clone())];
    Fixture {
        areas: Arc::new(AreaManager::new(factories)),
        tasks: TaskManager::new(config.task_manager_config()),
        resolver: Arc::new(JurisdictionResolver::new(default_processors())),
    }
}

fn paths(raw: &[&str]) -> Vec<PathBuf> {
    raw.iter().map(PathBuf::from).collect()
}

// ---------------------------------------------------------------------------
// Test: classification scan
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scan_reports_owners_and_counts_deletable_paths() {
    let f = fixture(AREAS);

    let result = run_classification_scan(
        &f.tasks,
        &f.areas,
        f.resolver.clone(),
        paths(&[
            "/data/app-private/cache/file.tmp",
            "/data/app-private-other/x",
            "/storage/emulated/0/Android/data/com.example/cache",
            "/vendor/lib/libfoo.so",
        ]),
    )
    .await
    .expect("scan succeeds");

    assert_eq!(result.tool, ToolType::CorpseFinder);
    assert_eq!(result.kind, TaskKind::Scan);
    // The vendor path is owned but protected; the second path is unowned.
    assert_eq!(result.output.affected, 2);

    let detail = result.output.detail.as_array().expect("classification list");
    assert_eq!(detail.len(), 4);
    assert_eq!(detail[0]["owner"]["prefix"], "/data/app-private/");
    assert!(detail[1]["owner"].is_null());
    assert_eq!(detail[2]["owner"]["area"]["area_type"], "PUBLIC_DATA");
    assert_eq!(detail[3]["owner"]["is_protected"], true);
}

#[tokio::test]
async fn completed_scan_with_findings_offers_delete() {
    let f = fixture(AREAS);

    run_classification_scan(
        &f.tasks,
        &f.areas,
        f.resolver.clone(),
        paths(&["/data/app-private/cache/file.tmp"]),
    )
    .await
    .unwrap();

    let state = f.tasks.current();
    assert_eq!(state.state_of(ToolType::CorpseFinder), ToolState::Idle);

    let overview = Overview::derive(f.areas.latest().as_deref(), &state);
    assert_eq!(overview.main_action, MainAction::Delete);
    assert!(!overview.needs_area_setup);
}

#[tokio::test]
async fn empty_area_table_needs_setup() {
    let f = fixture("");

    let result = run_classification_scan(
        &f.tasks,
        &f.areas,
        f.resolver.clone(),
        paths(&["/data/app-private/cache/file.tmp"]),
    )
    .await
    .unwrap();
    assert_eq!(result.output.affected, 0);

    let overview = Overview::derive(f.areas.latest().as_deref(), &f.tasks.current());
    assert!(overview.needs_area_setup);
    assert_eq!(overview.main_action, MainAction::Scan);
}

#[tokio::test]
async fn busy_corpse_finder_rejects_scan() {
    let f = fixture(AREAS);

    let blocker = f
        .tasks
        .start(Task::new(ToolType::CorpseFinder, TaskKind::Scan, |ctx| async move {
            ctx.cancelled().await;
            Err(TaskError::Cancelled)
        }))
        .unwrap();

    let outcome =
        run_classification_scan(&f.tasks, &f.areas, f.resolver.clone(), paths(&["/vendor/x"]))
            .await;
    assert_matches!(
        outcome,
        Err(ScanError::Task(TaskError::ToolBusy(ToolType::CorpseFinder)))
    );

    f.tasks.cancel(ToolType::CorpseFinder);
    let _ = blocker.result().await;
}

#[tokio::test]
async fn scan_waits_for_storage_holder() {
    let f = fixture(AREAS);
    let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();

    let holder = f
        .tasks
        .start(
            Task::new(ToolType::AppCleaner, TaskKind::Delete, |_ctx| async move {
                let _ = gate_rx.await;
                Ok(TaskOutput::new(5))
            })
            .requires(ResourceId::new(STORAGE_LOCK)),
        )
        .unwrap();

    let scan = tokio::spawn({
        let tasks = f.tasks.clone();
        let areas = f.areas.clone();
        let resolver = f.resolver.clone();
        async move { run_classification_scan(&tasks, &areas, resolver, paths(&["/vendor/x"])).await }
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!scan.is_finished());
    assert_eq!(
        f.tasks.current().state_of(ToolType::CorpseFinder),
        ToolState::Idle
    );

    gate_tx.send(()).unwrap();
    assert!(holder.result().await.is_ok());
    assert!(scan.await.unwrap().is_ok());
}
