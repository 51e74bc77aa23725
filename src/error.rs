//! Error types used by the step machine and its workers.
//!
//! There is one enum, [`MachineError`], for configuration errors: a machine
//! declared with duplicate step names, a jump to a step that does not exist,
//! or a relative jump that has nowhere to go. These are programmer errors and
//! are never retried.
//!
//! Operational conditions (a step that is not ready yet) are not errors; they
//! are expressed with [`StepResult::Repeat`](crate::StepResult::Repeat).
//! Lifecycle timeouts (`Worker::start` / `Worker::stop`) are reported as `false`.

use thiserror::Error;

/// # Configuration errors of a step machine.
///
/// Raised while building or re-initializing a [`StepTree`](crate::StepTree)
/// and while jumping. A tree that produced one of these from inside a tick
/// is considered faulted and its worker terminates.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// Two or more steps share a name somewhere in the tree.
    #[error("duplicate step names in machine {machine:?}: {}", format_duplicates(.duplicates))]
    DuplicateSteps {
        /// Name of the root step.
        machine: String,
        /// Each duplicated name with its multiplicity, in listing order.
        duplicates: Vec<(String, usize)>,
    },

    /// A jump named a step that is not part of the tree.
    #[error("unable to jump to step {name:?}: no such step")]
    UnknownStep {
        /// The requested step name.
        name: String,
    },

    /// `jump_to_next` was called from the last step of the listing.
    #[error("no step follows {from:?}")]
    NoNextStep {
        /// The step the jump was requested from.
        from: String,
    },

    /// The machine has no steps below its root, so first/last jumps have no target.
    #[error("machine {machine:?} has no steps")]
    EmptyMachine {
        /// Name of the root step.
        machine: String,
    },
}

impl MachineError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use stepvisor::MachineError;
    ///
    /// let err = MachineError::UnknownStep { name: "Z".into() };
    /// assert_eq!(err.as_label(), "machine_unknown_step");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MachineError::DuplicateSteps { .. } => "machine_duplicate_steps",
            MachineError::UnknownStep { .. } => "machine_unknown_step",
            MachineError::NoNextStep { .. } => "machine_no_next_step",
            MachineError::EmptyMachine { .. } => "machine_empty",
        }
    }

    /// Returns a multi-line, human-readable report.
    ///
    /// For duplicates this lists every offending name as `"<count>x <name>"`.
    pub fn as_message(&self) -> String {
        match self {
            MachineError::DuplicateSteps {
                machine,
                duplicates,
            } => {
                let mut msg = format!(
                    "Duplicate name found in state machine!\n\nState Machine:\n{machine}\n\nSteps:\n"
                );
                for (name, count) in duplicates {
                    msg.push_str(&format!("{count}x {name}\n"));
                }
                msg
            }
            other => other.to_string(),
        }
    }
}

fn format_duplicates(duplicates: &[(String, usize)]) -> String {
    duplicates
        .iter()
        .map(|(name, count)| format!("{count}x {name}"))
        .collect::<Vec<_>>()
        .join(", ")
}
