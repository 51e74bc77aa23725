//! # WorkerGroup: composite shutdown unit.
//!
//! A [`WorkerGroup`] owns worker loops and nested shutdown units (other
//! groups, or anything implementing [`Shutdown`]). Polling it polls every
//! owned loop and child, so one poll of the top-level unit fans the close
//! request out through the whole ownership tree.
//!
//! ```text
//! app.shutdown_ready()
//!   ├─► serial_worker.shutdown_ready()   close + pulse, report
//!   └─► telnet.shutdown_ready()
//!         ├─► listener_worker.shutdown_ready()
//!         └─► session_worker.shutdown_ready()
//! ```
//!
//! ## Rules
//! - Ready iff every owned loop has terminated and every child is ready
//! - A group with nothing to own is ready on the first poll
//! - Polling is non-blocking and idempotent; after readiness it keeps reporting done

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::status::{ClosingStatus, Shutdown};
use super::worker::Worker;

/// Composite unit owning worker loops and child units.
pub struct WorkerGroup {
    name: Arc<str>,
    workers: Vec<Arc<Worker>>,
    children: Vec<Arc<dyn Shutdown>>,
    polls: AtomicUsize,
}

impl WorkerGroup {
    /// Creates an empty group.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            workers: Vec::new(),
            children: Vec::new(),
            polls: AtomicUsize::new(0),
        }
    }

    /// Adds a worker loop owned by this group.
    pub fn with_worker(mut self, worker: Arc<Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    /// Adds a nested shutdown unit.
    pub fn with_child(mut self, child: Arc<dyn Shutdown>) -> Self {
        self.children.push(child);
        self
    }

    /// Worker loops owned directly by this group.
    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Nested units, in insertion order.
    pub fn children(&self) -> &[Arc<dyn Shutdown>] {
        &self.children
    }
}

impl Shutdown for WorkerGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown_ready(&self) -> ClosingStatus {
        let own: Vec<ClosingStatus> = self.workers.iter().map(|w| w.shutdown_ready()).collect();
        let own_ready = own.iter().all(|s| s.ready);

        let mut statuses = own;
        statuses.extend(self.children.iter().map(|c| c.shutdown_ready()));

        let polls = if own_ready && statuses.iter().all(|s| s.ready) {
            0
        } else {
            self.polls.fetch_add(1, Ordering::Relaxed)
        };
        ClosingStatus::aggregate(&self.name, own_ready, statuses, polls)
    }
}

impl std::fmt::Debug for WorkerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("name", &self.name)
            .field("workers", &self.workers.len())
            .field("children", &self.children.len())
            .finish()
    }
}
