//! # LogWriter: events to `tracing`
//!
//! A subscriber that renders every [`Event`] as a structured `tracing` event.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Levels
//! - `info`: worker started/terminated, close requested, requests completed
//! - `debug`: jumps, start/stop requested, shutdown status while not ready
//! - `warn`: request timed out
//! - `error`: worker faulted

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::WorkerStarted => info!(worker, seq = e.seq, "worker started"),
            EventKind::CloseRequested => info!(worker, seq = e.seq, "close requested"),
            EventKind::WorkerTerminated => info!(worker, seq = e.seq, "worker terminated"),
            EventKind::WorkerFaulted => error!(
                worker,
                seq = e.seq,
                reason = e.reason.as_deref().unwrap_or(""),
                "worker faulted"
            ),
            EventKind::StartRequested | EventKind::StopRequested => debug!(
                worker,
                seq = e.seq,
                kind = ?e.kind,
                timeout_ms = e.delay_ms,
                "control request"
            ),
            EventKind::RequestCompleted => info!(
                worker,
                seq = e.seq,
                request = e.reason.as_deref().unwrap_or(""),
                "request completed"
            ),
            EventKind::RequestTimedOut => warn!(
                worker,
                seq = e.seq,
                request = e.reason.as_deref().unwrap_or(""),
                timeout_ms = e.delay_ms,
                "request timed out"
            ),
            EventKind::StepJumped => debug!(
                worker,
                seq = e.seq,
                step = e.step.as_deref().unwrap_or(""),
                "jumped"
            ),
            EventKind::ShutdownStatus => match e.ready {
                Some(true) => info!(worker, seq = e.seq, "shutdown ready"),
                _ => debug!(
                    worker,
                    seq = e.seq,
                    status = e.reason.as_deref().unwrap_or(""),
                    "shutdown pending"
                ),
            },
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
