//! # Worker: one dedicated loop driving one step tree.
//!
//! A [`Worker`] owns a [`StepTree`] and a tokio task that ticks it forever,
//! sleeping between ticks for the delay of the step that just ran. External
//! callers never touch the tree directly while the loop runs; they raise
//! flags (start, stop, close) or jump under the tree lock and wake the loop
//! with [`Worker::pulse`].
//!
//! ## Loop
//! ```text
//! publish WorkerStarted
//! loop {
//!   drop a pulse already pending (this turn serves it)
//!   lock tree
//!   ├─► start requested → clear flag, jump_to_first
//!   ├─► stop requested  → clear flag, jump_to_last
//!   ├─► close requested → thread_closing = true
//!   │                      machine_complete or no steps → exit
//!   │                      else jump_to_last
//!   ├─► tick()           → Err → publish WorkerFaulted, exit
//!   unlock
//!   ├─► delay == 0 → yield
//!   │   delay  > 0 → sleep(delay) or pulse, whichever first
//!   └─► tick hook
//! }
//! publish WorkerTerminated
//! ```
//!
//! ## Rules
//! - Steps of one tree never run concurrently; the tree lock is never held across an await
//! - A pulse raised while the loop is busy is kept and cuts the next sleep short;
//!   a pulse already pending when a turn starts is consumed by that turn
//! - Close is re-applied on every turn until a step calls `complete_machine`
//! - Start and stop on a machine without steps are no-ops

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::builder::{TickHook, WorkerBuilder};
use crate::core::status::{ClosingStatus, Shutdown};
use crate::error::MachineError;
use crate::events::{Bus, Event, EventKind};
use crate::machine::StepTree;

/// Lifecycle of a worker loop as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// The loop is ticking and no close was requested.
    Running,
    /// Close was requested; the loop is running cleanup.
    Closing,
    /// The loop has exited.
    Terminated,
}

/// State shared between the handle and the loop task.
pub(crate) struct Shared {
    tree: Mutex<StepTree>,
    pulse: Notify,
    start_requested: AtomicBool,
    stop_requested: AtomicBool,
    close: CancellationToken,
}

impl Shared {
    pub(crate) fn new(tree: StepTree) -> Self {
        Self {
            tree: Mutex::new(tree),
            pulse: Notify::new(),
            start_requested: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            close: CancellationToken::new(),
        }
    }

    fn lock_tree(&self) -> MutexGuard<'_, StepTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Copy)]
enum Request {
    Start,
    Stop,
}

impl Request {
    fn label(self) -> &'static str {
        match self {
            Request::Start => "start",
            Request::Stop => "stop",
        }
    }
}

/// Handle to a running worker loop.
///
/// Created with [`Worker::builder`] (or [`Worker::spawn`]); must be created
/// inside a tokio runtime. Dropping the handle requests close so an orphaned
/// loop still runs its cleanup and exits.
pub struct Worker {
    name: Arc<str>,
    cfg: Config,
    bus: Bus,
    shared: Arc<Shared>,
    join: JoinHandle<()>,
    polls: AtomicUsize,
}

impl Worker {
    /// Starts configuring a worker named `name` that will drive `tree`.
    pub fn builder(name: impl Into<Arc<str>>, tree: StepTree) -> WorkerBuilder {
        WorkerBuilder::new(name, tree)
    }

    /// Spawns a worker with default configuration and a private bus.
    pub fn spawn(name: impl Into<Arc<str>>, tree: StepTree) -> Arc<Self> {
        Self::builder(name, tree).spawn()
    }

    pub(crate) fn launch(
        name: Arc<str>,
        tree: StepTree,
        cfg: Config,
        bus: Bus,
        hook: Option<TickHook>,
    ) -> Self {
        let shared = Arc::new(Shared::new(tree));
        let worker_loop = WorkerLoop {
            name: Arc::clone(&name),
            bus: bus.clone(),
            shared: Arc::clone(&shared),
            hook,
        };
        let join = tokio::spawn(worker_loop.run());

        Self {
            name,
            cfg,
            bus,
            shared,
            join,
            polls: AtomicUsize::new(0),
        }
    }

    /// Worker name, used in events and shutdown status lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bus this worker publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Requests a jump to the first step and waits up to the configured
    /// request timeout for the loop to perform it.
    ///
    /// Returns `false` on timeout; the request stays pending.
    pub async fn start(&self) -> bool {
        self.start_within(self.cfg.request_timeout).await
    }

    /// Like [`Worker::start`] with an explicit timeout.
    pub async fn start_within(&self, timeout: Duration) -> bool {
        self.request(Request::Start, timeout).await
    }

    /// Requests a jump to the last (cleanup) step and waits up to the
    /// configured request timeout for the loop to perform it.
    pub async fn stop(&self) -> bool {
        self.stop_within(self.cfg.request_timeout).await
    }

    /// Like [`Worker::stop`] with an explicit timeout.
    pub async fn stop_within(&self, timeout: Duration) -> bool {
        self.request(Request::Stop, timeout).await
    }

    async fn request(&self, req: Request, timeout: Duration) -> bool {
        let (flag, kind) = match req {
            Request::Start => (&self.shared.start_requested, EventKind::StartRequested),
            Request::Stop => (&self.shared.stop_requested, EventKind::StopRequested),
        };

        flag.store(true, Ordering::SeqCst);
        self.bus.publish(
            Event::new(kind)
                .with_worker(Arc::clone(&self.name))
                .with_delay(timeout),
        );
        self.pulse();

        let deadline = Instant::now() + timeout;
        loop {
            if !flag.load(Ordering::SeqCst) {
                self.bus.publish(
                    Event::new(EventKind::RequestCompleted)
                        .with_worker(Arc::clone(&self.name))
                        .with_reason(req.label()),
                );
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                self.bus.publish(
                    Event::new(EventKind::RequestTimedOut)
                        .with_worker(Arc::clone(&self.name))
                        .with_reason(req.label())
                        .with_delay(timeout),
                );
                return false;
            }
            time::sleep(self.cfg.request_poll_clamped().min(deadline - now)).await;
        }
    }

    /// Wakes the loop early if it is sleeping between ticks.
    ///
    /// A pulse raised while the loop is busy shortens the next sleep.
    pub fn pulse(&self) {
        self.shared.pulse.notify_one();
    }

    /// Repositions the machine at `name` and wakes the loop.
    ///
    /// An unknown name returns an error and leaves the machine untouched.
    pub fn jump_to_step(&self, name: &str) -> Result<(), MachineError> {
        self.external_jump(|tree| {
            let root = tree.root();
            tree.jump_to_step(name, root)
        })
    }

    /// Repositions the machine at its first step and wakes the loop.
    pub fn jump_to_first(&self) -> Result<(), MachineError> {
        self.external_jump(|tree| {
            let root = tree.root();
            tree.jump_to_first(root)
        })
    }

    /// Repositions the machine at its last step and wakes the loop.
    pub fn jump_to_last(&self) -> Result<(), MachineError> {
        self.external_jump(|tree| {
            let root = tree.root();
            tree.jump_to_last(root)
        })
    }

    fn external_jump(
        &self,
        jump: impl FnOnce(&mut StepTree) -> Result<(), MachineError>,
    ) -> Result<(), MachineError> {
        {
            let mut tree = self.shared.lock_tree();
            jump(&mut *tree)?;
            publish_jump(&self.bus, &self.name, &mut tree);
        }
        self.pulse();
        Ok(())
    }

    /// Asks the loop to run cleanup and exit. Idempotent.
    pub fn request_close(&self) {
        self.shared.close.cancel();
        self.pulse();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        if self.join.is_finished() {
            WorkerState::Terminated
        } else if self.shared.close.is_cancelled() {
            WorkerState::Closing
        } else {
            WorkerState::Running
        }
    }

    /// True once the loop task has exited.
    pub fn is_terminated(&self) -> bool {
        self.join.is_finished()
    }

    /// Name of the step the machine will execute next.
    pub fn active_step(&self) -> String {
        let tree = self.shared.lock_tree();
        tree.node(tree.active_leaf()).name().to_string()
    }

    /// Runs `f` with shared access to the tree, holding the tree lock.
    pub fn with_tree<R>(&self, f: impl FnOnce(&StepTree) -> R) -> R {
        let tree = self.shared.lock_tree();
        f(&*tree)
    }
}

impl Shutdown for Worker {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown_ready(&self) -> ClosingStatus {
        if self.is_terminated() {
            return ClosingStatus::done(&self.name);
        }
        self.request_close();
        ClosingStatus::waiting(&self.name, self.polls.fetch_add(1, Ordering::Relaxed))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.request_close();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Outcome of one locked turn of the loop.
enum Turn {
    Sleep(Duration),
    Exit,
}

/// The task side of a worker.
struct WorkerLoop {
    name: Arc<str>,
    bus: Bus,
    shared: Arc<Shared>,
    hook: Option<TickHook>,
}

impl WorkerLoop {
    async fn run(self) {
        self.bus
            .publish(Event::new(EventKind::WorkerStarted).with_worker(Arc::clone(&self.name)));

        let mut close_seen = false;
        loop {
            let _ = self.shared.pulse.notified().now_or_never();

            let turn = {
                let mut tree = self.shared.lock_tree();
                self.turn(&mut tree, &mut close_seen)
            };

            let delay = match turn {
                Ok(Turn::Sleep(delay)) => delay,
                Ok(Turn::Exit) => break,
                Err(err) => {
                    self.bus.publish(
                        Event::new(EventKind::WorkerFaulted)
                            .with_worker(Arc::clone(&self.name))
                            .with_reason(format!("{}: {}", err.as_label(), err)),
                    );
                    break;
                }
            };

            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = time::sleep(delay) => {}
                    _ = self.shared.pulse.notified() => {}
                }
            }

            if let Some(hook) = &self.hook {
                hook();
            }
        }

        self.bus
            .publish(Event::new(EventKind::WorkerTerminated).with_worker(Arc::clone(&self.name)));
    }

    fn turn(&self, tree: &mut StepTree, close_seen: &mut bool) -> Result<Turn, MachineError> {
        let root = tree.root();

        if self.shared.start_requested.swap(false, Ordering::SeqCst) {
            skip_empty(tree.jump_to_first(root))?;
            publish_jump(&self.bus, &self.name, tree);
        }

        if self.shared.stop_requested.swap(false, Ordering::SeqCst) {
            skip_empty(tree.jump_to_last(root))?;
            publish_jump(&self.bus, &self.name, tree);
        }

        if self.shared.close.is_cancelled() {
            tree.set_thread_closing();
            let first_close = !std::mem::replace(close_seen, true);
            if first_close {
                self.bus.publish(
                    Event::new(EventKind::CloseRequested).with_worker(Arc::clone(&self.name)),
                );
            }
            if tree.state().machine_complete() || !skip_empty(tree.jump_to_last(root))? {
                return Ok(Turn::Exit);
            }
            if first_close {
                publish_jump(&self.bus, &self.name, tree);
            } else {
                tree.take_jump();
            }
        }

        let ticked = tree.tick();
        publish_jump(&self.bus, &self.name, tree);
        ticked?;
        Ok(Turn::Sleep(tree.state().tick_delay()))
    }
}

/// Turns a jump on a machine without steps into "nothing happened".
///
/// Returns whether the jump took place.
fn skip_empty(res: Result<(), MachineError>) -> Result<bool, MachineError> {
    match res {
        Ok(()) => Ok(true),
        Err(MachineError::EmptyMachine { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

fn publish_jump(bus: &Bus, worker: &Arc<str>, tree: &mut StepTree) {
    if let Some(step) = tree.take_jump() {
        bus.publish(
            Event::new(EventKind::StepJumped)
                .with_worker(Arc::clone(worker))
                .with_step(step),
        );
    }
}
