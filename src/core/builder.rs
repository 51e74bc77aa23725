use std::sync::Arc;

use crate::{config::Config, events::Bus, machine::StepTree};

use super::worker::Worker;

/// Callback invoked by the loop after every tick's sleep.
pub type TickHook = Box<dyn Fn() + Send + Sync + 'static>;

/// Builder for spawning a [`Worker`] with optional features.
pub struct WorkerBuilder {
    name: Arc<str>,
    tree: StepTree,
    cfg: Config,
    bus: Option<Bus>,
    hook: Option<TickHook>,
}

impl WorkerBuilder {
    /// Creates a builder for a worker named `name` driving `tree`.
    pub fn new(name: impl Into<Arc<str>>, tree: StepTree) -> Self {
        Self {
            name: name.into(),
            tree,
            cfg: Config::default(),
            bus: None,
            hook: None,
        }
    }

    /// Replaces the default configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Publishes events to `bus` instead of a private one.
    ///
    /// Share one bus between workers and the shutdown registry so a single
    /// `SubscriberSet` observes the whole application.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Installs a callback run once per loop turn, after the sleep.
    pub fn with_tick_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Spawns the loop task and returns its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> Arc<Worker> {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        Arc::new(Worker::launch(self.name, self.tree, self.cfg, bus, self.hook))
    }
}
