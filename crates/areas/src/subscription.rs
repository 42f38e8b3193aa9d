//! Observer handles for the area manager.
//!
//! Both handles wrap a `tokio::sync::watch` receiver: a late subscriber
//! reads the most recent value immediately and then receives subsequent
//! updates in order.

use std::sync::Arc;

use reclaim_core::AreaSnapshot;
use tokio::sync::watch;

use crate::AreaError;

/// What a recomputation generation produced.
pub(crate) type Published = Result<Arc<AreaSnapshot>, AreaError>;

/// Subscription to recomputed snapshots (the `state` stream).
///
/// Creating one starts the recomputation worker if it is not running yet.
pub struct StateSubscription {
    rx: watch::Receiver<Option<Published>>,
    primed: bool,
}

impl StateSubscription {
    pub(crate) fn new(rx: watch::Receiver<Option<Published>>) -> Self {
        Self { rx, primed: false }
    }

    /// Wait for the next generation.
    ///
    /// The first call returns the most recently published generation
    /// without waiting, if there is one. Later calls wait for a newer
    /// generation. A failed generation is returned as
    /// [`AreaError::RecomputationFailed`]; the stream stays usable.
    pub async fn next(&mut self) -> Result<Arc<AreaSnapshot>, AreaError> {
        if !self.primed {
            self.primed = true;
            let published = self
                .rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| AreaError::Closed)?
                .clone();
            return published.unwrap_or(Err(AreaError::Closed));
        }

        loop {
            self.rx.changed().await.map_err(|_| AreaError::Closed)?;
            if let Some(published) = self.rx.borrow_and_update().clone() {
                return published;
            }
        }
    }

    /// Wait for the next successfully computed snapshot, skipping failed
    /// generations.
    pub async fn next_ok(&mut self) -> Result<Arc<AreaSnapshot>, AreaError> {
        loop {
            match self.next().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(AreaError::Closed) => return Err(AreaError::Closed),
                Err(err) => tracing::debug!(error = %err, "Skipping failed area generation"),
            }
        }
    }
}

/// Passive view of the cached last-good snapshot (the `latestState`
/// stream). Never triggers a recomputation.
#[derive(Clone)]
pub struct LatestState {
    rx: watch::Receiver<Option<Arc<AreaSnapshot>>>,
}

impl LatestState {
    pub(crate) fn new(rx: watch::Receiver<Option<Arc<AreaSnapshot>>>) -> Self {
        Self { rx }
    }

    /// The cached snapshot, or `None` if nothing was computed yet.
    pub fn get(&self) -> Option<Arc<AreaSnapshot>> {
        self.rx.borrow().clone()
    }

    /// Wait until the cache changes, then return the new value.
    pub async fn changed(&mut self) -> Result<Option<Arc<AreaSnapshot>>, AreaError> {
        self.rx.changed().await.map_err(|_| AreaError::Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}
