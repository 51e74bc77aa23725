//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to notifications emitted by workers and the shutdown
//! registry. It is the crate's "fire an update" channel: publishing never
//! blocks and never fails, and consumers pick their own dispatch context.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Worker` (loop lifecycle, requests, jumps, faults),
//!   `ShutdownRegistry` (status after every poll).
//! - **Consumers**: `SubscriberSet::listen()` (fans out to user subscribers),
//!   or any direct `Bus::subscribe()` receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
