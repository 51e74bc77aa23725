//! # Dispatcher: jumps and tick execution over a [`StepTree`].
//!
//! ## Jump
//! ```text
//! jump_to_step(name, from)
//!   ├─► name not in listing      → Err(UnknownStep), tree untouched
//!   ├─► initialize()             (full rebuild, every counter reset)
//!   ├─► locate(root, name)       (sets active_child along root → target)
//!   └─► from.skip_delay_once = true
//! ```
//!
//! ## Tick
//! ```text
//! execute_step(node):
//!   active_child < children  → r = execute_step(child)
//!                              r == finished → active_child += 1   (seen next tick)
//!                              return not finished
//!   active_child == children → tick_delay = node.delay
//!                              result = action(ctx)
//!                              skip_delay_once → tick_delay = 0
//!                              jumped during action → return not finished
//!                              Continue → finished
//!                              Repeat   → fail_count += 1 (saturating), not finished
//! ```
//!
//! ## Rules
//! - Advancement moves at most one tree level per tick; a finished nested
//!   branch needs one tick per level to unwind
//! - The result of an action that jumped is ignored
//! - A jump error raised inside an action faults the tick

use std::sync::Arc;
use std::time::Duration;

use crate::error::MachineError;
use crate::machine::context::StepCtx;
use crate::machine::step::StepResult;
use crate::machine::tree::{StepId, StepTree};

impl StepTree {
    /// Repositions the machine so that the step called `name` runs next.
    ///
    /// Reinitializes the whole tree, walks the path from the root to the
    /// target and marks `from` to skip its delay once.
    pub fn jump_to_step(&mut self, name: &str, from: StepId) -> Result<(), MachineError> {
        if self.find(name).is_none() {
            return Err(MachineError::UnknownStep {
                name: name.to_string(),
            });
        }

        self.initialize()?;
        if self.locate(StepId::ROOT, name).is_none() {
            return Err(MachineError::UnknownStep {
                name: name.to_string(),
            });
        }

        self.nodes[from.0].skip_delay_once = true;
        self.state.last_jump = Some(Arc::from(name));
        Ok(())
    }

    /// Depth-first search that points every node on the path at the child
    /// containing `name`. Returns the position of that child.
    fn locate(&mut self, id: StepId, name: &str) -> Option<usize> {
        self.nodes[id.0].active_child = 0;

        for pos in 0..self.nodes[id.0].children.len() {
            let child = self.nodes[id.0].children[pos];
            if &*self.nodes[child.0].name != name && self.locate(child, name).is_none() {
                continue;
            }
            self.nodes[id.0].active_child = pos;
            return Some(pos);
        }

        let node = &mut self.nodes[id.0];
        node.active_child = node.children.len();
        None
    }

    /// Jumps to the first step of the listing.
    pub fn jump_to_first(&mut self, from: StepId) -> Result<(), MachineError> {
        let name = self
            .state
            .listing
            .first()
            .map(|entry| Arc::clone(&entry.name))
            .ok_or_else(|| self.empty_machine())?;
        self.jump_to_step(&name, from)
    }

    /// Jumps to the last step of the listing, conventionally the cleanup step.
    pub fn jump_to_last(&mut self, from: StepId) -> Result<(), MachineError> {
        let name = self
            .state
            .listing
            .last()
            .map(|entry| Arc::clone(&entry.name))
            .ok_or_else(|| self.empty_machine())?;
        self.jump_to_step(&name, from)
    }

    /// Jumps to the listing entry following `from`; from the root this is the first step.
    pub fn jump_to_next(&mut self, from: StepId) -> Result<(), MachineError> {
        let next = self.nodes[from.0].stable_index.map_or(0, |index| index + 1);
        let name = match self.state.listing.get(next) {
            Some(entry) => Arc::clone(&entry.name),
            None if self.state.listing.is_empty() => return Err(self.empty_machine()),
            None => {
                return Err(MachineError::NoNextStep {
                    from: self.nodes[from.0].name.to_string(),
                });
            }
        };
        self.jump_to_step(&name, from)
    }

    fn empty_machine(&self) -> MachineError {
        MachineError::EmptyMachine {
            machine: self.name().to_string(),
        }
    }

    /// Runs one tick starting at the root.
    ///
    /// Returns `true` when the root itself ran and finished.
    pub fn tick(&mut self) -> Result<bool, MachineError> {
        self.execute_step(StepId::ROOT)
    }

    /// Executes the active descendant of `id` (or `id` itself when all its
    /// children are done). Returns `true` if `id`'s branch finished this call.
    pub fn execute_step(&mut self, id: StepId) -> Result<bool, MachineError> {
        let node = &self.nodes[id.0];
        if let Some(&child) = node.children.get(node.active_child) {
            if self.execute_step(child)? {
                self.nodes[id.0].active_child += 1;
            }
            return Ok(false);
        }

        self.state.tick_delay = node.delay;
        let action = Arc::clone(&node.action);

        let mut ctx = StepCtx::new(self, id);
        let result = action.run(&mut ctx);
        let jumped = ctx.jumped();

        if let Some(err) = self.state.fault.take() {
            return Err(err);
        }

        let node = &mut self.nodes[id.0];
        if node.skip_delay_once {
            node.skip_delay_once = false;
            self.state.tick_delay = Duration::ZERO;
        }
        if jumped {
            return Ok(false);
        }

        match result {
            StepResult::Continue => Ok(true),
            StepResult::Repeat => {
                node.fail_count = node.fail_count.saturating_add(1);
                Ok(false)
            }
        }
    }

    /// True once `id` has repeated for at least `timeout` worth of its own delay.
    ///
    /// The step is timed out when `fail_count >= round(timeout / delay)`.
    /// A zero timeout never expires; a zero delay counts as 1 ms.
    pub fn is_timed_out(&self, timeout: Duration, id: StepId) -> bool {
        let node = &self.nodes[id.0];
        is_timed_out(timeout, node.delay, node.fail_count)
    }
}

pub(crate) fn is_timed_out(timeout: Duration, delay: Duration, fail_count: u32) -> bool {
    if timeout.is_zero() {
        return false;
    }
    let delay_ms = (delay.as_millis() as f64).max(1.0);
    let steps = (timeout.as_millis() as f64 / delay_ms).round_ties_even();
    f64::from(fail_count) >= steps
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::machine::step::Step;

    /// Records the name of every step whose action ran.
    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Step) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &str| {
                let log = Arc::clone(&log);
                let owned = name.to_string();
                Step::new(name).with_action(move |_ctx| {
                    log.lock().unwrap().push(owned.clone());
                    StepResult::Continue
                })
            }
        };
        (log, make)
    }

    fn names(tree: &StepTree) -> Vec<String> {
        tree.listing().iter().map(|e| e.name.to_string()).collect()
    }

    #[test]
    fn continue_advances_on_the_next_tick() {
        let (log, leaf) = recorder();
        let mut tree = StepTree::new(Step::group(
            "chain",
            [leaf("S1"), leaf("S2"), leaf("S3")],
        ))
        .unwrap();

        assert!(!tree.tick().unwrap());
        assert_eq!(*log.lock().unwrap(), ["S1"]);
        assert_eq!(tree.node(tree.active_leaf()).name(), "S2");

        tree.tick().unwrap();
        assert_eq!(*log.lock().unwrap(), ["S1", "S2"]);
    }

    #[test]
    fn repeat_counts_failures_and_times_out() {
        let mut tree = StepTree::new(Step::group(
            "chain",
            [
                Step::new("S1").with_delay_ms(100),
                Step::new("S2")
                    .with_delay_ms(100)
                    .with_action(|_ctx| StepResult::Repeat),
                Step::new("S3").with_delay_ms(100),
            ],
        ))
        .unwrap();
        let s2 = tree.find("S2").unwrap();

        tree.tick().unwrap();
        for expected in 1..=5 {
            tree.tick().unwrap();
            assert_eq!(tree.node(s2).fail_count(), expected);
            if expected == 4 {
                assert!(!tree.is_timed_out(Duration::from_millis(500), s2));
            }
        }
        assert!(tree.is_timed_out(Duration::from_millis(500), s2));
        assert_eq!(tree.node(tree.active_leaf()).name(), "S2");
        assert_eq!(tree.state().tick_delay(), Duration::from_millis(100));
    }

    #[test]
    fn nested_completion_unwinds_one_level_per_tick() {
        let (log, leaf) = recorder();
        let mut tree = StepTree::new(Step::group(
            "root",
            [
                Step::group("outer", [Step::group("inner", [leaf("deep")])]),
                leaf("after"),
            ],
        ))
        .unwrap();

        tree.tick().unwrap(); // deep runs
        tree.tick().unwrap(); // inner's own action
        tree.tick().unwrap(); // outer's own action
        assert_eq!(*log.lock().unwrap(), ["deep"]);

        tree.tick().unwrap();
        assert_eq!(*log.lock().unwrap(), ["deep", "after"]);
    }

    #[test]
    fn jump_runs_target_next_and_skips_other_steps() {
        let (log, leaf) = recorder();
        let mut tree = StepTree::new(Step::group(
            "root",
            [
                Step::group("A", [leaf("A1"), leaf("A2")]),
                Step::group("G", [leaf("G1"), leaf("B")]),
                leaf("C"),
            ],
        ))
        .unwrap();

        tree.jump_to_step("B", StepId::ROOT).unwrap();
        tree.tick().unwrap();
        assert_eq!(*log.lock().unwrap(), ["B"]);

        let a = tree.find("A").unwrap();
        assert_eq!(tree.node(a).active_child(), 2);
        assert_eq!(tree.root_node().active_child(), 1);
    }

    #[test]
    fn unknown_jump_target_leaves_tree_untouched() {
        let mut tree = StepTree::new(Step::group(
            "root",
            [Step::new("S1"), Step::new("S2").with_action(|_| StepResult::Repeat)],
        ))
        .unwrap();
        tree.tick().unwrap();
        tree.tick().unwrap();
        let s2 = tree.find("S2").unwrap();
        assert_eq!(tree.node(s2).fail_count(), 1);

        let err = tree.jump_to_step("Z", StepId::ROOT).unwrap_err();
        assert_eq!(
            err,
            MachineError::UnknownStep {
                name: "Z".to_string()
            }
        );
        assert_eq!(tree.node(s2).fail_count(), 1);
        assert_eq!(tree.root_node().active_child(), 1);
        assert!(tree.state.last_jump.is_none());
    }

    #[test]
    fn first_and_last_ignore_current_position() {
        let (log, leaf) = recorder();
        let mut tree = StepTree::new(Step::group(
            "root",
            [leaf("S1"), Step::group("G", [leaf("S2"), leaf("S3")])],
        ))
        .unwrap();

        tree.jump_to_last(StepId::ROOT).unwrap();
        tree.tick().unwrap();
        tree.jump_to_first(StepId::ROOT).unwrap();
        tree.tick().unwrap();
        assert_eq!(*log.lock().unwrap(), ["S3", "S1"]);
        assert_eq!(names(&tree), ["S1", "G", "S2", "S3"]);
    }

    #[test]
    fn jump_to_a_group_enters_its_first_child() {
        let (log, leaf) = recorder();
        let mut tree = StepTree::new(Step::group(
            "root",
            [leaf("S1"), Step::group("G", [leaf("S2"), leaf("S3")])],
        ))
        .unwrap();

        tree.jump_to_step("G", StepId::ROOT).unwrap();
        tree.tick().unwrap();
        assert_eq!(*log.lock().unwrap(), ["S2"]);
    }

    #[test]
    fn jump_to_next_walks_the_listing() {
        let mut tree = StepTree::new(Step::group(
            "root",
            [Step::new("S1"), Step::new("S2")],
        ))
        .unwrap();
        let s1 = tree.find("S1").unwrap();
        let s2 = tree.find("S2").unwrap();

        tree.jump_to_next(s1).unwrap();
        assert_eq!(tree.active_leaf(), s2);

        let err = tree.jump_to_next(s2).unwrap_err();
        assert_eq!(err.as_label(), "machine_no_next_step");

        tree.jump_to_next(StepId::ROOT).unwrap();
        assert_eq!(tree.active_leaf(), s1);
    }

    #[test]
    fn empty_machine_cannot_jump() {
        let mut tree = StepTree::new(Step::new("lonely")).unwrap();
        let err = tree.jump_to_first(StepId::ROOT).unwrap_err();
        assert_eq!(err.as_label(), "machine_empty");
        assert!(tree.jump_to_last(StepId::ROOT).is_err());
        assert!(tree.jump_to_next(StepId::ROOT).is_err());
    }

    #[test]
    fn jump_inside_action_ignores_result_and_skips_delay() {
        let (log, leaf) = recorder();
        let mut tree = StepTree::new(Step::group(
            "root",
            [
                leaf("Start"),
                Step::new("Search").with_delay_ms(200).with_action(|ctx| {
                    ctx.jump_to_last().unwrap();
                    StepResult::Continue
                }),
                leaf("Middle"),
                leaf("Cleanup"),
            ],
        ))
        .unwrap();

        tree.tick().unwrap();
        assert!(!tree.tick().unwrap());
        assert_eq!(tree.state().tick_delay(), Duration::ZERO);
        assert_eq!(tree.node(tree.active_leaf()).name(), "Cleanup");

        tree.tick().unwrap();
        assert_eq!(*log.lock().unwrap(), ["Start", "Cleanup"]);
    }

    #[test]
    fn jump_error_inside_action_faults_the_tick() {
        let mut tree = StepTree::new(Step::group(
            "root",
            [Step::new("S1").with_action(|ctx| {
                let _ = ctx.jump_to("nowhere");
                StepResult::Continue
            })],
        ))
        .unwrap();

        let err = tree.tick().unwrap_err();
        assert_eq!(
            err,
            MachineError::UnknownStep {
                name: "nowhere".to_string()
            }
        );
    }

    #[test]
    fn skip_delay_zeroes_the_tick_delay() {
        let mut tree = StepTree::new(Step::group(
            "root",
            [Step::new("S1").with_delay_ms(300).with_action(|ctx| {
                ctx.skip_delay();
                StepResult::Repeat
            })],
        ))
        .unwrap();
        tree.tick().unwrap();
        assert_eq!(tree.state().tick_delay(), Duration::ZERO);
    }

    #[test]
    fn finished_machine_keeps_running_root_action() {
        let mut tree = StepTree::new(Step::group("root", [Step::new("only")])).unwrap();
        assert!(!tree.tick().unwrap());
        assert!(tree.tick().unwrap());
        assert!(tree.tick().unwrap());
    }

    #[test]
    fn timeout_rounding() {
        let ms = Duration::from_millis;
        assert!(!is_timed_out(ms(500), ms(100), 4));
        assert!(is_timed_out(ms(500), ms(100), 5));
        assert!(!is_timed_out(ms(0), ms(100), 1_000));
        // 250 / 100 = 2.5 rounds to 2
        assert!(is_timed_out(ms(250), ms(100), 2));
        // 350 / 100 = 3.5 rounds to 4
        assert!(!is_timed_out(ms(350), ms(100), 3));
        assert!(is_timed_out(ms(5), ms(0), 5));
    }

    #[test]
    fn fail_count_saturates_instead_of_wrapping() {
        let mut tree = StepTree::new(Step::group(
            "root",
            [Step::new("Poll")
                .with_delay_ms(1)
                .with_action(|_ctx| StepResult::Repeat)],
        ))
        .unwrap();
        let poll = tree.find("Poll").unwrap();
        tree.nodes[poll.0].fail_count = u32::MAX;

        tree.tick().unwrap();
        tree.tick().unwrap();
        assert_eq!(tree.node(poll).fail_count(), u32::MAX);
        assert!(tree.is_timed_out(Duration::from_millis(10), poll));
    }

    #[test]
    fn standalone_tree_keeps_only_the_latest_jump() {
        let mut tree = StepTree::new(Step::group(
            "root",
            [Step::new("Loop").with_action(|ctx| {
                ctx.jump_to("Loop").unwrap();
                StepResult::Continue
            })],
        ))
        .unwrap();

        for _ in 0..10_000 {
            tree.tick().unwrap();
        }
        assert_eq!(tree.take_jump().as_deref(), Some("Loop"));
        assert_eq!(tree.take_jump(), None);
    }
}
