//! # ShutdownRegistry: application-wide shutdown coordinator.
//!
//! Top-level units register themselves once; at exit the application polls
//! the registry until everything reports ready. The registry owns no loop of
//! its own and aggregates its units exactly as a [`WorkerGroup`] would.
//!
//! ## Drain
//! ```text
//! drain():
//!   loop {
//!     status = poll_all()          close requests fan out, ShutdownStatus published
//!     status.ready → return status
//!     sleep(cfg.shutdown_poll)
//!   }
//! ```
//!
//! ## Rules
//! - Polling never blocks; callers choose the cadence and may report between polls
//! - Every poll publishes [`EventKind::ShutdownStatus`] with the aggregate message
//! - Units are polled in registration order
//!
//! [`WorkerGroup`]: crate::WorkerGroup

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::time;

use crate::config::Config;
use crate::events::{Bus, Event, EventKind};

use super::signal::wait_for_shutdown_signal;
use super::status::{ClosingStatus, Shutdown};

/// Collection of top-level shutdown units.
pub struct ShutdownRegistry {
    name: Arc<str>,
    cfg: Config,
    bus: Bus,
    units: Mutex<Vec<Arc<dyn Shutdown>>>,
    polls: AtomicUsize,
}

impl ShutdownRegistry {
    /// Creates an empty registry publishing to a private bus.
    pub fn new(name: impl Into<Arc<str>>, cfg: Config) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::with_bus(name, cfg, bus)
    }

    /// Creates an empty registry publishing to `bus`.
    pub fn with_bus(name: impl Into<Arc<str>>, cfg: Config, bus: Bus) -> Self {
        Self {
            name: name.into(),
            cfg,
            bus,
            units: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    /// Registry name, used as the top status line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bus the registry publishes shutdown status to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Adds a top-level unit.
    pub fn register(&self, unit: Arc<dyn Shutdown>) {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(unit);
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.units.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Polls every registered unit once.
    ///
    /// Each poll (re)issues close requests down the ownership tree and
    /// returns the aggregate status. Non-blocking.
    pub fn poll_all(&self) -> ClosingStatus {
        let units: Vec<Arc<dyn Shutdown>> = self
            .units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let statuses: Vec<ClosingStatus> = units.iter().map(|u| u.shutdown_ready()).collect();
        let polls = if statuses.iter().all(|s| s.ready) {
            0
        } else {
            self.polls.fetch_add(1, Ordering::Relaxed)
        };
        let status = ClosingStatus::aggregate(&self.name, true, statuses, polls);

        self.bus.publish(
            Event::new(EventKind::ShutdownStatus)
                .with_worker(Arc::clone(&self.name))
                .with_reason(if status.ready { "" } else { status.message.as_str() })
                .with_ready(status.ready),
        );
        status
    }

    /// Polls until every unit is ready, sleeping `cfg.shutdown_poll` between polls.
    ///
    /// Never gives up: a unit whose cleanup never completes keeps the drain
    /// waiting. Wrap in `tokio::time::timeout` to bound it.
    pub async fn drain(&self) -> ClosingStatus {
        loop {
            let status = self.poll_all();
            if status.ready {
                return status;
            }
            time::sleep(self.cfg.shutdown_poll_clamped()).await;
        }
    }

    /// Waits for a termination signal, then drains.
    pub async fn drain_on_signal(&self) -> std::io::Result<ClosingStatus> {
        wait_for_shutdown_signal().await?;
        Ok(self.drain().await)
    }
}

impl Shutdown for ShutdownRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown_ready(&self) -> ClosingStatus {
        self.poll_all()
    }
}
