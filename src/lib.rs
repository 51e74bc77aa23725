//! # stepvisor
//!
//! **Stepvisor** runs hierarchical, named step machines on dedicated worker
//! loops and shuts them down gracefully.
//!
//! A machine is a tree of named steps. Leaves do the work; groups sequence
//! their children. Every tick the worker executes exactly one step and then
//! sleeps for that step's delay, so a leaf that returns
//! [`StepResult::Repeat`] polls at its own cadence. Any step can reposition
//! the machine by name ([`StepCtx::jump_to`]), and callers outside the loop
//! can do the same through [`Worker::jump_to_step`].
//!
//! ## Architecture
//! ```text
//!   Step (declaration)
//!        │ StepTree::new()  ─► flatten, validate names
//!        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Worker (one tokio task per tree)                           │
//! │  - start / stop / close flags, pulse (Notify)               │
//! │  - tick(): execute one step, sleep its delay or until pulse │
//! └──────┬─────────────────────────────────────────┬────────────┘
//!        │ publish(Event)                          │ Shutdown
//!        ▼                                         ▼
//! ┌──────────────────────┐               ┌─────────────────────────┐
//! │ Bus (broadcast)      │◄── status ────│ ShutdownRegistry        │
//! └──────────┬───────────┘               │  └─ WorkerGroup ...     │
//!            ▼                           │       └─ Worker ...     │
//!      SubscriberSet ─► LogWriter, ...   └─────────────────────────┘
//! ```
//!
//! ### Tick
//! ```text
//! execute_step(root)
//!   └─► descend along active_child to the active leaf
//!         ├─ Continue → parent advances on the next tick
//!         ├─ Repeat   → fail_count += 1, same leaf next tick
//!         └─ jumped   → result ignored, delay skipped once
//! ```
//!
//! ### Shutdown
//! ```text
//! registry.drain()
//!   loop {
//!     poll_all() ─► every unit: close + pulse, report ClosingStatus
//!     worker: thread_closing → jump_to_last → cleanup leaf → complete_machine → exit
//!     all ready? → return
//!   }
//! ```
//!
//! ## Features
//! | Area              | Description                                          | Key types / traits                          |
//! |-------------------|------------------------------------------------------|---------------------------------------------|
//! | **Machines**      | Declare steps, flatten and validate, jump by name.   | [`Step`], [`StepTree`], [`StepCtx`]         |
//! | **Workers**       | One loop per tree with start/stop/pulse/close.       | [`Worker`], [`WorkerBuilder`]               |
//! | **Shutdown**      | Recursive, non-blocking readiness polling.           | [`Shutdown`], [`WorkerGroup`], [`ShutdownRegistry`] |
//! | **Events**        | Broadcast runtime events, fan out to subscribers.    | [`Bus`], [`Event`], [`Subscribe`]           |
//! | **Errors**        | Typed configuration errors.                          | [`MachineError`]                            |
//! | **Configuration** | Request and shutdown timings, bus capacity.          | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use stepvisor::{Config, ShutdownRegistry, Step, StepResult, StepTree, Worker};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), stepvisor::MachineError> {
//!     let machine = Step::group("probe", [
//!         Step::new("Searching").with_delay_ms(5).with_action(|ctx| {
//!             if ctx.fail_count() < 2 { StepResult::Repeat } else { StepResult::Continue }
//!         }),
//!         Step::new("Cleanup").with_action(|ctx| {
//!             if ctx.is_closing() {
//!                 ctx.complete_machine();
//!             }
//!             StepResult::Continue
//!         }),
//!     ])
//!     .with_delay_ms(5);
//!
//!     let worker = Worker::spawn("probe", StepTree::new(machine)?);
//!     assert!(worker.start().await);
//!
//!     let registry = ShutdownRegistry::new("app", Config::default());
//!     registry.register(worker.clone());
//!     let status = registry.drain().await;
//!     assert!(status.ready);
//!     assert!(worker.is_terminated());
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod machine;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use self::core::{
    ClosingStatus, Shutdown, ShutdownRegistry, TickHook, Worker, WorkerBuilder, WorkerGroup,
    WorkerState, wait_for_shutdown_signal,
};
pub use error::MachineError;
pub use events::{Bus, Event, EventKind};
pub use machine::{
    Action, ActionRef, ListingEntry, SchedulerState, Step, StepCtx, StepId, StepNode, StepResult,
    StepTree,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
