//! # Step context handed to actions.
//!
//! [`StepCtx`] is the only view an action gets of its machine. It exposes the
//! executing step's counters and the jump operations. Jumps made through the
//! context reposition the tree immediately; the action's own return value is
//! then ignored and the tick's delay is skipped.
//!
//! A jump that fails (unknown name, nothing after the last step) is returned
//! to the action *and* recorded as a fault, so the tick reports it even if the
//! action drops the error.

use std::time::Duration;

use crate::error::MachineError;
use crate::machine::dispatch::is_timed_out;
use crate::machine::tree::{StepId, StepTree};

/// Mutable view of the machine for the step currently executing.
pub struct StepCtx<'a> {
    tree: &'a mut StepTree,
    id: StepId,
    jumped: bool,
}

impl<'a> StepCtx<'a> {
    pub(crate) fn new(tree: &'a mut StepTree, id: StepId) -> Self {
        Self {
            tree,
            id,
            jumped: false,
        }
    }

    pub(crate) fn jumped(&self) -> bool {
        self.jumped
    }

    /// Id of the executing step.
    pub fn id(&self) -> StepId {
        self.id
    }

    /// Name of the executing step.
    pub fn name(&self) -> &str {
        self.tree.node(self.id).name()
    }

    /// The step's configured delay.
    pub fn delay(&self) -> Duration {
        self.tree.node(self.id).delay()
    }

    /// Consecutive `Repeat` results of this step.
    pub fn fail_count(&self) -> u32 {
        self.tree.node(self.id).fail_count()
    }

    /// True on the first execution after the step was entered (or after any jump).
    pub fn is_first_pass(&self) -> bool {
        self.fail_count() == 0
    }

    /// True once this step has repeated for `timeout` worth of its own delay.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        let node = self.tree.node(self.id);
        is_timed_out(timeout, node.delay(), node.fail_count())
    }

    /// Skips the delay after this tick.
    pub fn skip_delay(&mut self) {
        self.tree.nodes[self.id.0].skip_delay_once = true;
    }

    /// True once the worker has been asked to close.
    pub fn is_closing(&self) -> bool {
        self.tree.state().thread_closing()
    }

    /// Reports the machine as finished; a closing worker exits after this tick.
    pub fn complete_machine(&mut self) {
        self.tree.set_machine_complete();
    }

    /// Read access to the whole machine.
    pub fn tree(&self) -> &StepTree {
        &*self.tree
    }

    /// Jumps to the step called `name`.
    pub fn jump_to(&mut self, name: &str) -> Result<(), MachineError> {
        let res = self.tree.jump_to_step(name, self.id);
        self.record(res)
    }

    /// Jumps to the first step of the machine.
    pub fn jump_to_first(&mut self) -> Result<(), MachineError> {
        let res = self.tree.jump_to_first(self.id);
        self.record(res)
    }

    /// Jumps to the last step of the machine.
    pub fn jump_to_last(&mut self) -> Result<(), MachineError> {
        let res = self.tree.jump_to_last(self.id);
        self.record(res)
    }

    /// Skips the rest of this step and jumps to the next one in the listing.
    pub fn jump_to_next(&mut self) -> Result<(), MachineError> {
        let res = self.tree.jump_to_next(self.id);
        self.record(res)
    }

    fn record(&mut self, res: Result<(), MachineError>) -> Result<(), MachineError> {
        match &res {
            Ok(()) => self.jumped = true,
            Err(err) => {
                if self.tree.state.fault.is_none() {
                    self.tree.state.fault = Some(err.clone());
                }
            }
        }
        res
    }
}
