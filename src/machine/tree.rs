//! # StepTree: the arena holding one machine.
//!
//! A [`Step`] declaration is flattened into one `Vec<StepNode>`; parent and
//! child links are [`StepId`] indices into that vector, so the tree has no
//! reference cycles. Index 0 is always the root, which owns the
//! [`SchedulerState`].
//!
//! ## Initialization
//! ```text
//! initialize(root)
//!   ├─► clear listing, counter = 0
//!   └─► preorder walk (declared sibling order):
//!         for child in children:
//!             listing.push(name, depth, parent)
//!             child.stable_index = counter++
//!             child.active_child = 0, child.fail_count = 0
//!             recurse(child)
//!   validate: group listing names, any group > 1 → DuplicateSteps
//! ```
//!
//! ## Rules
//! - The root is not listed and has no stable index
//! - After initialization `nodes[listing[i].id].stable_index == Some(i)`
//! - Names are unique across the listing; a violation is a fatal configuration error

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::MachineError;
use crate::machine::step::{ActionRef, Step, default_action};

/// Index of a node inside its [`StepTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub(crate) usize);

impl StepId {
    /// Id of the root node of every tree.
    pub const ROOT: StepId = StepId(0);

    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of the arena: identity, structure, and execution state.
pub struct StepNode {
    pub(crate) name: Arc<str>,
    pub(crate) parent: Option<StepId>,
    pub(crate) children: Vec<StepId>,
    pub(crate) delay: Duration,
    pub(crate) action: ActionRef,

    pub(crate) stable_index: Option<usize>,
    pub(crate) active_child: usize,
    pub(crate) fail_count: u32,
    pub(crate) skip_delay_once: bool,
}

impl StepNode {
    /// Step name, unique within the tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent node (`None` for the root).
    pub fn parent(&self) -> Option<StepId> {
        self.parent
    }

    /// Children in declared order.
    pub fn children(&self) -> &[StepId] {
        &self.children
    }

    /// Configured per-step delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Position in the flattened listing (`None` for the root).
    pub fn stable_index(&self) -> Option<usize> {
        self.stable_index
    }

    /// Index of the child currently in progress; equals the child count when
    /// this node itself is the one to run.
    pub fn active_child(&self) -> usize {
        self.active_child
    }

    /// Consecutive `Repeat` results since the step was last (re)entered.
    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    /// True if the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn reset(&mut self) {
        self.active_child = 0;
        self.fail_count = 0;
    }
}

/// One entry of the flattened preorder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Step name.
    pub name: Arc<str>,
    /// Tree depth; children of the root are at depth 1.
    pub depth: usize,
    /// Parent of the step.
    pub parent: StepId,
    /// The step itself.
    pub id: StepId,
}

/// Root-level state shared by every node of one tree.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub(crate) listing: Vec<ListingEntry>,
    pub(crate) counter: usize,
    pub(crate) thread_closing: bool,
    pub(crate) machine_complete: bool,
    pub(crate) tick_delay: Duration,
    pub(crate) fault: Option<MachineError>,
    pub(crate) last_jump: Option<Arc<str>>,
}

impl SchedulerState {
    /// Flattened preorder listing from the most recent initialization.
    pub fn listing(&self) -> &[ListingEntry] {
        &self.listing
    }

    /// True once the owning worker has been asked to close.
    pub fn thread_closing(&self) -> bool {
        self.thread_closing
    }

    /// True once the cleanup step reported the machine as finished.
    pub fn machine_complete(&self) -> bool {
        self.machine_complete
    }

    /// Delay configured by the last executed step (zero if it skipped its delay).
    pub fn tick_delay(&self) -> Duration {
        self.tick_delay
    }
}

/// An initialized, validated machine.
pub struct StepTree {
    pub(crate) nodes: Vec<StepNode>,
    pub(crate) state: SchedulerState,
}

impl StepTree {
    /// Flattens `root` into an arena and initializes it.
    ///
    /// Fails with [`MachineError::DuplicateSteps`] if any two steps below the
    /// root share a name.
    pub fn new(root: Step) -> Result<Self, MachineError> {
        let mut tree = Self {
            nodes: Vec::new(),
            state: SchedulerState::default(),
        };
        tree.insert(root, None);
        tree.initialize()?;
        Ok(tree)
    }

    fn insert(&mut self, step: Step, parent: Option<StepId>) -> StepId {
        let id = StepId(self.nodes.len());
        self.nodes.push(StepNode {
            name: Arc::from(step.name),
            parent,
            children: Vec::with_capacity(step.children.len()),
            delay: step.delay,
            action: step.action.unwrap_or_else(default_action),
            stable_index: None,
            active_child: 0,
            fail_count: 0,
            skip_delay_once: false,
        });
        for child in step.children {
            let child_id = self.insert(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    /// Resets every node and rebuilds the flattened listing, then validates names.
    ///
    /// Run on construction and at the start of every jump.
    pub fn initialize(&mut self) -> Result<(), MachineError> {
        self.state.listing.clear();
        self.state.counter = 0;
        self.nodes[StepId::ROOT.0].reset();
        self.initialize_from(StepId::ROOT, 1);
        self.check_duplicates()
    }

    fn initialize_from(&mut self, id: StepId, depth: usize) {
        for pos in 0..self.nodes[id.0].children.len() {
            let child = self.nodes[id.0].children[pos];
            let index = self.state.counter;
            self.state.counter += 1;

            let node = &mut self.nodes[child.0];
            node.stable_index = Some(index);
            node.reset();
            self.state.listing.push(ListingEntry {
                name: Arc::clone(&node.name),
                depth,
                parent: id,
                id: child,
            });

            self.initialize_from(child, depth + 1);
        }
    }

    fn check_duplicates(&self) -> Result<(), MachineError> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in &self.state.listing {
            *counts.entry(&*entry.name).or_insert(0) += 1;
        }

        let mut duplicates: Vec<(String, usize)> = Vec::new();
        for entry in &self.state.listing {
            let count = counts[&*entry.name];
            if count > 1 && !duplicates.iter().any(|(name, _)| **name == *entry.name) {
                duplicates.push((entry.name.to_string(), count));
            }
        }

        if duplicates.is_empty() {
            return Ok(());
        }
        Err(MachineError::DuplicateSteps {
            machine: self.root_node().name.to_string(),
            duplicates,
        })
    }

    /// Id of the root node.
    pub fn root(&self) -> StepId {
        StepId::ROOT
    }

    /// Root node.
    pub fn root_node(&self) -> &StepNode {
        &self.nodes[StepId::ROOT.0]
    }

    /// Name of the machine (the root step's name).
    pub fn name(&self) -> &str {
        &self.root_node().name
    }

    /// Node by id.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: StepId) -> &StepNode {
        &self.nodes[id.0]
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the root has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Root-level scheduler state.
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Flattened preorder listing.
    pub fn listing(&self) -> &[ListingEntry] {
        &self.state.listing
    }

    /// Looks a step up by name in the listing.
    pub fn find(&self, name: &str) -> Option<StepId> {
        self.state
            .listing
            .iter()
            .find(|entry| &*entry.name == name)
            .map(|entry| entry.id)
    }

    /// Follows the active-child pointers from the root down to the node that
    /// will run on the next tick.
    pub fn active_leaf(&self) -> StepId {
        let mut id = StepId::ROOT;
        loop {
            let node = &self.nodes[id.0];
            match node.children.get(node.active_child) {
                Some(&child) => id = child,
                None => return id,
            }
        }
    }

    /// Marks the tree as closing; the worker sets this when a close is requested.
    pub fn set_thread_closing(&mut self) {
        self.state.thread_closing = true;
    }

    /// Marks the machine as finished so a closing worker may exit.
    pub fn set_machine_complete(&mut self) {
        self.state.machine_complete = true;
    }

    /// Takes the target of the most recent jump not yet reported.
    pub(crate) fn take_jump(&mut self) -> Option<Arc<str>> {
        self.state.last_jump.take()
    }
}
