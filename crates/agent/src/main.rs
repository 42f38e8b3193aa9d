//! `reclaim-agent` -- resolves storage areas and classifies paths.
//!
//! Computes the area snapshot from the configured table, then runs a
//! corpse-finder scan that reports the owning area of every path given
//! on the command line.
//!
//! ```text
//! reclaim-agent [PATH...]
//! ```
//!
//! # Environment variables
//!
//! | Variable             | Required | Default | Description                                  |
//! |----------------------|----------|---------|----------------------------------------------|
//! | `RECLAIM_AREAS`      | no       | empty   | `TYPE=/abs/path[,...]`, `TYPE!=` blacklists   |
//! | `CANCEL_GRACE_SECS`  | no       | `30`    | Cancellation grace period, `0` disables it    |
//! | `EVENT_BUS_CAPACITY` | no       | `1024`  | Event bus buffer size                         |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reclaim_agent::config::AgentConfig;
use reclaim_agent::overview::Overview;
use reclaim_agent::scan;
use reclaim_areas::{AreaFactory, AreaManager};
use reclaim_events::{EventBus, EventJournal};
use reclaim_forensics::{default_processors, JurisdictionResolver};
use reclaim_tasks::TaskManager;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long the journal gets to drain once the managers are gone.
const JOURNAL_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reclaim_agent=info,reclaim_areas=info,reclaim_tasks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(
        configured_areas = config.areas.areas().len(),
        cancel_grace_secs = config.cancel_grace_secs,
        event_bus_capacity = config.event_bus_capacity,
        "Starting reclaim-agent",
    );

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::new(config.event_bus_capacity));
    let journal = tokio::spawn(EventJournal::run(event_bus.subscribe()));

    // --- Registries ---
    let factories: Vec<Arc<dyn AreaFactory>> = vec![Arc::new(config.areas.clone())];
    let areas = AreaManager::with_event_bus(factories, Arc::clone(&event_bus));
    let resolver = Arc::new(JurisdictionResolver::new(default_processors()));
    let tasks = TaskManager::with_event_bus(config.task_manager_config(), Arc::clone(&event_bus));

    // --- Areas ---
    match areas.current_areas().await {
        Ok(snapshot) => {
            tracing::info!(
                generation = snapshot.generation(),
                area_count = snapshot.len(),
                "Areas resolved",
            );
            for area in snapshot.areas() {
                tracing::info!(area = %area, "Area");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Area resolution failed");
            std::process::exit(1);
        }
    }

    // --- Scan ---
    match scan::run_classification_scan(&tasks, &areas, resolver, paths).await {
        Ok(result) => {
            tracing::info!(
                task_id = %result.task_id,
                deletable = result.output.affected,
                duration_ms = result.duration_ms,
                "Classification scan finished",
            );
            println!("{:#}", result.output.detail);
        }
        Err(e) => tracing::error!(error = %e, "Classification scan failed"),
    }

    let overview = Overview::derive(areas.latest().as_deref(), &tasks.current());
    tracing::info!(
        main_action = ?overview.main_action,
        needs_area_setup = overview.needs_area_setup,
        "Overview",
    );

    // --- Shutdown ---
    tasks.shutdown();
    areas.shutdown();
    drop(tasks);
    drop(areas);
    drop(event_bus);
    match tokio::time::timeout(JOURNAL_DRAIN_TIMEOUT, journal).await {
        Ok(Ok(journaled)) => tracing::info!(journaled, "Shutdown complete"),
        _ => tracing::warn!("Event journal did not drain before exit"),
    }
}
