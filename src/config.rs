//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings shared by workers and the
//! shutdown registry.
//!
//! Config is used in two ways:
//! 1. **Worker creation**: `Worker::builder(name, tree).with_config(cfg)`
//! 2. **Registry creation**: `ShutdownRegistry::new(name, cfg)`
//!
//! ## Sentinel values
//! - `request_timeout = 0s` → `start`/`stop` return immediately after one check
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Global configuration for workers and shutdown polling.
///
/// ## Field semantics
/// - `request_timeout`: How long `Worker::start` / `Worker::stop` wait for the loop to acknowledge
/// - `request_poll`: How often those calls re-check their request flag while waiting
/// - `shutdown_poll`: Cadence used by `ShutdownRegistry::drain` between polls
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility; step delays are configured per step, not here.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default time `start`/`stop` wait for the worker loop to clear its request flag.
    pub request_timeout: Duration,

    /// Interval between request-flag checks while `start`/`stop` wait.
    ///
    /// Clamped to at least 1 ms.
    pub request_poll: Duration,

    /// Interval between `poll_all` calls while draining a registry.
    pub shutdown_poll: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the request poll interval clamped to a minimum of 1 ms.
    #[inline]
    pub fn request_poll_clamped(&self) -> Duration {
        self.request_poll.max(Duration::from_millis(1))
    }

    /// Returns the shutdown poll interval clamped to a minimum of 1 ms.
    #[inline]
    pub fn shutdown_poll_clamped(&self) -> Duration {
        self.shutdown_poll.max(Duration::from_millis(1))
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `request_timeout = 50ms`
    /// - `request_poll = 10ms`
    /// - `shutdown_poll = 50ms`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(50),
            request_poll: Duration::from_millis(10),
            shutdown_poll: Duration::from_millis(50),
            bus_capacity: 1024,
        }
    }
}
