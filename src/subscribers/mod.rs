//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the fan-out [`SubscriberSet`]
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Worker / Registry ── publish(Event) ──► Bus ──► SubscriberSet::listen()
//!                                                       │
//!                                         ┌─────────────┼─────────────┐
//!                                         ▼             ▼             ▼
//!                                     LogWriter    UI status     custom ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use stepvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct StatusLine;
//!
//! #[async_trait]
//! impl Subscribe for StatusLine {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ShutdownStatus {
//!             // redraw a status line with ev.reason
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "status-line" }
//! }
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
