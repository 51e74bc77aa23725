//! Runtime core: worker loops and graceful shutdown.
//!
//! Internal modules:
//! - [`worker`]: one tokio task per step tree; start/stop/jump/close requests;
//! - [`builder`]: configures and spawns a worker;
//! - [`status`]: shutdown status tree and the [`Shutdown`] trait;
//! - [`group`]: composite unit owning loops and child units;
//! - [`registry`]: application-wide coordinator with `poll_all`/`drain`;
//! - [`signal`]: cross-platform termination signal helper.

mod builder;
mod group;
mod registry;
mod signal;
mod status;
mod worker;

pub use builder::{TickHook, WorkerBuilder};
pub use group::WorkerGroup;
pub use registry::ShutdownRegistry;
pub use signal::wait_for_shutdown_signal;
pub use status::{ClosingStatus, Shutdown};
pub use worker::{Worker, WorkerState};
