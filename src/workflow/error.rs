//! Workflow Error Types
//!
//! Caller-facing errors raised while building, validating, loading, or
//! starting a workflow. Failures that occur *inside* a run (an action
//! returning an error, a branch table miss) are not errors at this level:
//! they are recorded in the execution context as [`Failure`] entries and
//! routed through each step's `on_failure` handler.
//!
//! [`Failure`]: crate::workflow::context::Failure

use thiserror::Error;

/// Errors surfaced to the caller of the construction and execution API.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A step with this name is already registered.
    #[error("duplicate step name: '{0}'")]
    DuplicateStep(String),

    /// A step definition is invalid (empty name, empty parallel action map).
    #[error("invalid step '{name}': {reason}")]
    Configuration { name: String, reason: String },

    /// The workflow has no steps to execute.
    #[error("workflow '{0}' has no steps")]
    EmptyWorkflow(String),

    /// The designated entry step is not registered.
    #[error("workflow '{workflow}' entry step '{entry}' is not registered")]
    UnknownEntry { workflow: String, entry: String },

    /// A routing field names a step that is not registered.
    #[error("step '{step}' routes to unknown step '{target}'")]
    UnknownStepReference { step: String, target: String },

    /// The walk was directed to a step name that does not exist.
    ///
    /// Pre-flight validation makes this unreachable for workflows built
    /// through `add_step`; it remains for diagnostics.
    #[error("no step named '{0}' in workflow")]
    UnknownStep(String),

    /// `execute` was called on a running or terminated instance.
    #[error("workflow '{0}' has already been executed (call reset() to reuse it)")]
    AlreadyExecuted(String),

    /// A definition references an action name the registry does not hold.
    #[error("step '{step}' references unknown action '{action}'")]
    UnknownAction { step: String, action: String },

    /// A definition file could not be read.
    #[error("failed to read workflow definition: {0}")]
    Io(#[from] std::io::Error),

    /// A definition file could not be parsed.
    #[error("failed to parse workflow definition: {0}")]
    Parse(#[from] serde_yaml::Error),
}
