//! # Declarative step definitions and leaf actions.
//!
//! A machine is declared as a nested [`Step`] value and handed to
//! [`StepTree::new`](crate::StepTree::new), which flattens it into an arena.
//!
//! - [`Action`] - trait for the work a step performs when it is the active leaf
//! - [`ActionRef`] - shared handle (`Arc<dyn Action>`)
//! - [`StepResult`] - what the action asks the dispatcher to do next
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stepvisor::{Step, StepResult};
//!
//! let machine = Step::group("probe", [
//!     Step::new("Searching")
//!         .with_delay(Duration::from_millis(200))
//!         .with_action(|ctx| {
//!             if ctx.fail_count() < 3 { StepResult::Repeat } else { StepResult::Continue }
//!         }),
//!     Step::new("Complete").with_delay_ms(200),
//! ]);
//! assert_eq!(machine.children().len(), 2);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::machine::context::StepCtx;

/// Outcome of one execution of a step's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The step is finished; its parent advances on the next tick.
    Continue,
    /// Run the same step again next tick (increments its fail count).
    Repeat,
}

/// # Work bound to a step.
///
/// Called on the worker task whenever the step is the active leaf. Actions are
/// synchronous and run while the tree lock is held; keep them short.
///
/// Any `Fn(&mut StepCtx<'_>) -> StepResult + Send + Sync + 'static` closure is an action.
pub trait Action: Send + Sync + 'static {
    /// Executes one tick of the step.
    fn run(&self, ctx: &mut StepCtx<'_>) -> StepResult;
}

impl<F> Action for F
where
    F: Fn(&mut StepCtx<'_>) -> StepResult + Send + Sync + 'static,
{
    fn run(&self, ctx: &mut StepCtx<'_>) -> StepResult {
        self(ctx)
    }
}

/// Shared handle to an action.
pub type ActionRef = Arc<dyn Action>;

/// Action used by steps declared without one.
fn continue_to_next(_ctx: &mut StepCtx<'_>) -> StepResult {
    StepResult::Continue
}

pub(crate) fn default_action() -> ActionRef {
    Arc::new(continue_to_next)
}

/// Declarative description of one step and its children.
///
/// A step without children is a leaf. A step with children runs its action
/// once, after all children have finished.
#[derive(Clone)]
pub struct Step {
    pub(crate) name: String,
    pub(crate) delay: Duration,
    pub(crate) action: Option<ActionRef>,
    pub(crate) children: Vec<Step>,
}

impl Step {
    /// Creates a leaf step with no delay and the default (always continue) action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: Duration::ZERO,
            action: None,
            children: Vec::new(),
        }
    }

    /// Creates a step with the given children, in execution order.
    pub fn group(name: impl Into<String>, children: impl IntoIterator<Item = Step>) -> Self {
        let mut step = Self::new(name);
        step.children = children.into_iter().collect();
        step
    }

    /// Sets the delay the worker sleeps after this step runs.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Same as [`Step::with_delay`] in milliseconds.
    pub fn with_delay_ms(self, ms: u64) -> Self {
        self.with_delay(Duration::from_millis(ms))
    }

    /// Binds the action run when this step is the active leaf.
    pub fn with_action<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut StepCtx<'_>) -> StepResult + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(f));
        self
    }

    /// Binds an already shared action.
    pub fn with_action_ref(mut self, action: ActionRef) -> Self {
        self.action = Some(action);
        self
    }

    /// Appends a child step.
    pub fn with_child(mut self, child: Step) -> Self {
        self.children.push(child);
        self
    }

    /// Step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Declared children.
    pub fn children(&self) -> &[Step] {
        &self.children
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("has_action", &self.action.is_some())
            .field("children", &self.children)
            .finish()
    }
}
