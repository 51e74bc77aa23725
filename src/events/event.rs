//! # Runtime events emitted by workers and the shutdown registry.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Worker lifecycle**: loop started, close requested, faulted, terminated
//! - **Control requests**: start/stop requested, acknowledged or timed out, jumps
//! - **Shutdown**: aggregated status after every registry poll
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker
//! and step names, reasons, and readiness.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use stepvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StepJumped)
//!     .with_worker("serial")
//!     .with_step("Searching");
//!
//! assert_eq!(ev.kind, EventKind::StepJumped);
//! assert_eq!(ev.worker.as_deref(), Some("serial"));
//! assert_eq!(ev.step.as_deref(), Some("Searching"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// Worker loop task spawned.
    ///
    /// Sets:
    /// - `worker`: worker name
    WorkerStarted,

    /// First close request observed by the worker.
    ///
    /// Sets:
    /// - `worker`: worker name
    CloseRequested,

    /// A tick returned a configuration error; the loop exits.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: error label and message
    WorkerFaulted,

    /// Worker loop exited.
    ///
    /// Sets:
    /// - `worker`: worker name
    WorkerTerminated,

    // === Control requests ===
    /// `start` was called; the loop will jump to the first step.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `delay_ms`: caller timeout
    StartRequested,

    /// `stop` was called; the loop will jump to the last step.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `delay_ms`: caller timeout
    StopRequested,

    /// The loop acknowledged a start/stop request within the caller's timeout.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: `"start"` or `"stop"`
    RequestCompleted,

    /// The loop did not acknowledge a start/stop request in time.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: `"start"` or `"stop"`
    /// - `delay_ms`: caller timeout
    RequestTimedOut,

    /// The machine was repositioned by a jump.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `step`: target step
    StepJumped,

    // === Shutdown ===
    /// Aggregated shutdown status after a registry poll.
    ///
    /// Sets:
    /// - `worker`: registry name
    /// - `reason`: status message (empty when ready)
    /// - `ready`: overall readiness
    ShutdownStatus,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the worker (or registry), if applicable.
    pub worker: Option<Arc<str>>,
    /// Name of the step, if applicable.
    pub step: Option<Arc<str>>,
    /// Human-readable reason or status message.
    pub reason: Option<Arc<str>>,
    /// Delay or timeout in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Readiness reported by a shutdown poll.
    pub ready: Option<bool>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            step: None,
            reason: None,
            delay_ms: None,
            ready: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a step name.
    #[inline]
    pub fn with_step(mut self, step: impl Into<Arc<str>>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches shutdown readiness.
    #[inline]
    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }
}
