//! # Shutdown status tree.
//!
//! Every unit that owns worker loops answers the non-blocking question
//! "ready to shut down?" with a [`ClosingStatus`]. Composite units nest their
//! children's answers, so the status tree mirrors the ownership tree.
//!
//! ## Message format
//! ```text
//! serial: waiting...                  ← composite line, 1-5 cycling dots
//!   serial/loop: waiting..            ← not-ready children, indented two spaces
//!   telnet: waiting.
//!     telnet/loop: waiting.           ← nested children keep their own indent
//! ```
//! A ready unit reports `"<name>: done"` and lists no children in its message.

use std::fmt;

/// Readiness of one unit and, recursively, of everything it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingStatus {
    /// Human-readable status; multi-line for composites that are still waiting.
    pub message: String,
    /// True only when this unit and all its children have terminated.
    pub ready: bool,
    /// Children in ownership order.
    pub children: Vec<ClosingStatus>,
}

impl ClosingStatus {
    /// Status of a unit whose loop has terminated.
    pub fn done(name: &str) -> Self {
        Self {
            message: format!("{name}: done"),
            ready: true,
            children: Vec::new(),
        }
    }

    /// Status of a unit still waiting; `polls` drives the cycling ellipsis.
    pub fn waiting(name: &str, polls: usize) -> Self {
        Self {
            message: waiting_line(name, polls),
            ready: false,
            children: Vec::new(),
        }
    }

    /// Combines a unit's own readiness with its children's statuses.
    ///
    /// Ready iff `own_ready` and every child is ready. While waiting, the
    /// message is the unit's own line followed by each not-ready child's
    /// message, indented one level.
    pub fn aggregate(
        name: &str,
        own_ready: bool,
        children: Vec<ClosingStatus>,
        polls: usize,
    ) -> Self {
        let ready = own_ready && children.iter().all(|c| c.ready);
        if ready {
            return Self {
                children,
                ..Self::done(name)
            };
        }

        let mut message = waiting_line(name, polls);
        for child in children.iter().filter(|c| !c.ready) {
            message.push_str("\n  ");
            message.push_str(&child.message.replace('\n', "\n  "));
        }
        Self {
            message,
            ready,
            children,
        }
    }

    /// Children that are not ready yet.
    pub fn pending(&self) -> impl Iterator<Item = &ClosingStatus> {
        self.children.iter().filter(|c| !c.ready)
    }
}

impl fmt::Display for ClosingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// `"<name>: waiting"` followed by 1 to 5 dots.
fn waiting_line(name: &str, polls: usize) -> String {
    format!("{name}: waiting{}", ".".repeat(polls % 5 + 1))
}

/// A unit that owns one or more worker loops and can be asked to shut down.
///
/// `shutdown_ready` must not block: on every call it (re)issues the close
/// request to whatever it owns and reports how far the shutdown got.
pub trait Shutdown: Send + Sync {
    /// Name used in status lines.
    fn name(&self) -> &str;

    /// Requests close and reports readiness.
    fn shutdown_ready(&self) -> ClosingStatus;
}
