//! Step machines: declaration, arena, and dispatch.
//!
//! This module holds the pure, single-threaded part of the crate. Nothing here
//! spawns, sleeps, or locks; the [`Worker`](crate::Worker) drives it.
//!
//! Internal modules:
//! - [`step`]: declarative [`Step`] builder, [`Action`] trait, [`StepResult`];
//! - [`tree`]: the [`StepTree`] arena, initialization and name validation;
//! - [`dispatch`]: jumps, tick execution and the timeout helper;
//! - [`context`]: [`StepCtx`], the view an action gets of its machine.

mod context;
mod dispatch;
mod step;
mod tree;

pub use context::StepCtx;
pub use step::{Action, ActionRef, Step, StepResult};
pub use tree::{ListingEntry, SchedulerState, StepId, StepNode, StepTree};
