//! Named resource locks with FIFO hand-off.
//!
//! Every reservation takes a ticket and is appended to the queue of each
//! resource it needs in one step under the table mutex. A reservation is
//! granted once it heads all of its queues. Because tickets enter every
//! queue in the same global order, two reservations can never wait on
//! each other.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

/// Name of a lock shared between tools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId(Arc<str>);

impl ResourceId {
    /// Name a lockable resource.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The resource name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// LockTable
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Queues {
    next_ticket: u64,
    waiting: HashMap<ResourceId, VecDeque<u64>>,
}

pub(crate) struct LockTable {
    queues: Mutex<Queues>,
    /// Bumped on every release so waiters re-check their position.
    released: watch::Sender<u64>,
}

impl LockTable {
    pub(crate) fn new() -> Arc<Self> {
        let (released, _) = watch::channel(0);
        Arc::new(Self {
            queues: Mutex::new(Queues::default()),
            released,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a queue position on every resource in `resources`.
    ///
    /// Never waits; the position alone fixes the hand-off order.
    pub(crate) fn reserve(
        self: &Arc<Self>,
        resources: impl IntoIterator<Item = ResourceId>,
    ) -> Reservation {
        let mut resources: Vec<ResourceId> = resources.into_iter().collect();
        resources.sort();
        resources.dedup();

        let released = self.released.subscribe();
        let mut queues = self.lock();
        let ticket = queues.next_ticket;
        queues.next_ticket += 1;
        for resource in &resources {
            queues
                .waiting
                .entry(resource.clone())
                .or_default()
                .push_back(ticket);
        }
        drop(queues);

        Reservation {
            table: Arc::clone(self),
            ticket,
            resources,
            released,
        }
    }

    fn heads_all(&self, ticket: u64, resources: &[ResourceId]) -> bool {
        let queues = self.lock();
        resources
            .iter()
            .all(|r| queues.waiting.get(r).and_then(|q| q.front()) == Some(&ticket))
    }

    fn release(&self, ticket: u64, resources: &[ResourceId]) {
        let mut queues = self.lock();
        for resource in resources {
            if let Some(queue) = queues.waiting.get_mut(resource) {
                queue.retain(|t| *t != ticket);
                if queue.is_empty() {
                    queues.waiting.remove(resource);
                }
            }
        }
        drop(queues);
        self.released.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Number of reservations holding or waiting for `resource`.
    #[cfg(test)]
    fn queue_len(&self, resource: &ResourceId) -> usize {
        self.lock().waiting.get(resource).map_or(0, VecDeque::len)
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// A queue position on a set of resources. Dropping it leaves every
/// queue, releasing the locks if they were granted.
pub(crate) struct Reservation {
    table: Arc<LockTable>,
    ticket: u64,
    resources: Vec<ResourceId>,
    released: watch::Receiver<u64>,
}

impl Reservation {
    /// Wait until this reservation heads every queue it is in.
    pub(crate) async fn granted(&mut self) {
        loop {
            if self.table.heads_all(self.ticket, &self.resources) {
                return;
            }
            // The sender lives in the table this reservation keeps alive.
            if self.released.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn resources(&self) -> &[ResourceId] {
        &self.resources
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.resources.is_empty() {
            self.table.release(self.ticket, &self.resources);
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceLease
// ---------------------------------------------------------------------------

/// Locks held by a [`TaskManager::use_res`](crate::TaskManager::use_res)
/// scope.
///
/// Cheap to clone. Tasks started [`within`](crate::Task::within) the
/// lease keep a clone, so the locks stay held until the scope and every
/// task started in it have finished.
#[derive(Clone)]
pub struct ResourceLease {
    inner: Arc<Reservation>,
}

impl ResourceLease {
    pub(crate) fn new(granted: Reservation) -> Self {
        Self {
            inner: Arc::new(granted),
        }
    }

    /// Resources held by the lease, sorted.
    pub fn resources(&self) -> &[ResourceId] {
        self.inner.resources()
    }

    /// Whether the lease holds `resource`.
    pub fn covers(&self, resource: &ResourceId) -> bool {
        self.inner.resources.contains(resource)
    }
}

impl fmt::Debug for ResourceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLease")
            .field("resources", &self.inner.resources)
            .finish()
    }
}
