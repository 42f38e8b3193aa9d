//! Cached, single-flight area recomputation.
//!
//! [`AreaManager`] owns the canonical area snapshot. A background worker
//! recomputes it whenever the trigger key changes; triggers arriving
//! while a pass is in flight coalesce into exactly one follow-up pass.
//! The worker is spawned lazily by the first [`AreaManager::state`]
//! subscription and runs until [`AreaManager::shutdown`].

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use futures::future::join_all;
use reclaim_core::types::Generation;
use reclaim_core::{Area, AreaSnapshot};
use reclaim_events::bus::{EVENT_AREAS_RELOADED, EVENT_AREAS_RELOAD_FAILED};
use reclaim_events::{CoreEvent, EventBus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::factory::AreaFactory;
use crate::subscription::{LatestState, Published, StateSubscription};
use crate::AreaError;

/// Owns the area snapshot and its recomputation.
pub struct AreaManager {
    shared: Arc<Shared>,
    worker: OnceLock<JoinHandle<()>>,
}

struct Shared {
    factories: Vec<Arc<dyn AreaFactory>>,
    /// Monotonic trigger key; every change requests a new generation.
    trigger: watch::Sender<Generation>,
    /// Every generation's outcome, successful or not.
    state: watch::Sender<Option<Published>>,
    /// Last successful snapshot only.
    latest: watch::Sender<Option<Arc<AreaSnapshot>>>,
    event_bus: Option<Arc<EventBus>>,
    cancel: CancellationToken,
}

impl AreaManager {
    /// Create a manager over a fixed factory registry.
    pub fn new(factories: Vec<Arc<dyn AreaFactory>>) -> Self {
        Self::build(factories, None)
    }

    /// Create a manager that also emits `areas.*` events on `event_bus`.
    pub fn with_event_bus(factories: Vec<Arc<dyn AreaFactory>>, event_bus: Arc<EventBus>) -> Self {
        Self::build(factories, Some(event_bus))
    }

    fn build(factories: Vec<Arc<dyn AreaFactory>>, event_bus: Option<Arc<EventBus>>) -> Self {
        let (trigger, _) = watch::channel(0);
        let (state, _) = watch::channel(None);
        let (latest, _) = watch::channel(None);

        Self {
            shared: Arc::new(Shared {
                factories,
                trigger,
                state,
                latest,
                event_bus,
                cancel: CancellationToken::new(),
            }),
            worker: OnceLock::new(),
        }
    }

    /// Request a recomputation.
    ///
    /// Never blocks. If a pass is in flight, this request is coalesced
    /// with any other request made during that pass into one follow-up
    /// pass.
    pub fn reload(&self) {
        tracing::warn!("Area reload requested");
        self.shared.trigger.send_modify(|key| *key += 1);
    }

    /// Subscribe to recomputed snapshots.
    ///
    /// Starts the recomputation worker on first use; must be called from
    /// within a Tokio runtime.
    pub fn state(&self) -> StateSubscription {
        self.worker.get_or_init(|| {
            tracing::debug!(factories = self.shared.factories.len(), "Starting area worker");
            tokio::spawn(run_worker(Arc::clone(&self.shared)))
        });
        StateSubscription::new(self.shared.state.subscribe())
    }

    /// Passive view of the last good snapshot. Never starts the worker.
    pub fn latest_state(&self) -> LatestState {
        LatestState::new(self.shared.latest.subscribe())
    }

    /// The cached last good snapshot, if any.
    pub fn latest(&self) -> Option<Arc<AreaSnapshot>> {
        self.shared.latest.borrow().clone()
    }

    /// The current snapshot, computing the first one if necessary.
    pub async fn current_areas(&self) -> Result<Arc<AreaSnapshot>, AreaError> {
        self.state().next().await
    }

    /// Stop the recomputation worker. Subscribers observe
    /// [`AreaError::Closed`] once the manager is dropped.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down area manager");
        self.shared.cancel.cancel();
    }
}

impl Drop for AreaManager {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn run_worker(shared: Arc<Shared>) {
    let mut trigger = shared.trigger.subscribe();

    loop {
        let generation = *trigger.borrow_and_update();

        let published = tokio::select! {
            _ = shared.cancel.cancelled() => break,
            published = shared.recompute(generation) => published,
        };
        shared.publish(generation, published);

        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            changed = trigger.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!("Area worker exited");
}

impl Shared {
    /// Run every factory once and merge their output.
    async fn recompute(&self, generation: Generation) -> Published {
        let started = Instant::now();
        let results = join_all(self.factories.iter().map(|f| f.build())).await;

        let mut areas: Vec<Area> = Vec::new();
        for (factory, result) in self.factories.iter().zip(results) {
            match result {
                Ok(built) => {
                    tracing::debug!(generation, factory = factory.name(), count = built.len(), "Factory finished");
                    areas.extend(built);
                }
                Err(e) => {
                    tracing::error!(generation, factory = factory.name(), error = %e, "Area factory failed");
                    return Err(AreaError::RecomputationFailed {
                        generation,
                        factory: factory.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let snapshot = AreaSnapshot::from_areas(generation, areas);
        tracing::info!(
            generation,
            area_count = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Area snapshot computed",
        );
        Ok(Arc::new(snapshot))
    }

    fn publish(&self, generation: Generation, published: Published) {
        match &published {
            Ok(snapshot) => {
                self.latest.send_replace(Some(Arc::clone(snapshot)));
                self.emit(
                    CoreEvent::new(EVENT_AREAS_RELOADED).with_payload(serde_json::json!({
                        "generation": generation,
                        "area_count": snapshot.len(),
                    })),
                );
            }
            Err(e) => {
                self.emit(
                    CoreEvent::new(EVENT_AREAS_RELOAD_FAILED).with_payload(serde_json::json!({
                        "generation": generation,
                        "error": e.to_string(),
                    })),
                );
            }
        }
        self.state.send_replace(Some(published));
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
