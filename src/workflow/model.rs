//! Workflow Data Model
//!
//! Core data structures representing workflow steps, their actions, and
//! their routing rules.
//!
//! A workflow is a named, directed graph of steps. Each step invokes a
//! single action, a set of parallel actions, or an entire nested workflow,
//! then routes to a successor either unconditionally (`next_step`), by
//! branching on the action's result (`branch`), or to a failure handler
//! (`on_failure`).
//!
//! # Example
//!
//! ```
//! use flowrunner::execution::action::Action;
//! use flowrunner::workflow::model::{Step, Workflow};
//! use serde_json::json;
//!
//! let mut workflow = Workflow::new("etl");
//! workflow.add_step(
//!     Step::new("extract", Action::from_sync(|_| Ok(json!({"rows": 10}))))
//!         .with_next("load"),
//! ).unwrap();
//! workflow.add_step(
//!     Step::new("load", Action::from_sync(|input| Ok(input))),
//! ).unwrap();
//! ```

use std::collections::HashMap;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::execution::action::Action;

use super::context::ExecutionContext;
use super::error::WorkflowError;

/// Lifecycle status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Constructed, steps may still be registered.
    Initialized,
    /// The walk is in progress.
    Running,
    /// The walk terminated at a step with no successor.
    Completed,
    /// A failure went unhandled (or the hop guard tripped).
    Failed,
}

impl WorkflowStatus {
    /// Returns true for `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The work a step performs.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// One opaque callable.
    Single(Action),
    /// Named sub-actions executed concurrently.
    Parallel(HashMap<String, Action>),
    /// A complete nested workflow run to completion.
    SubWorkflow(Box<Workflow>),
}

/// A named node in the workflow graph.
///
/// Built in the builder style:
///
/// ```
/// use flowrunner::execution::action::Action;
/// use flowrunner::workflow::model::Step;
/// use serde_json::json;
///
/// let step = Step::new("classify", Action::from_sync(|_| Ok(json!("ok"))))
///     .with_branch("ok", "publish")
///     .with_branch("spam", "quarantine")
///     .with_on_failure("report");
/// ```
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique name within a workflow.
    pub name: String,

    /// The action(s) this step invokes.
    pub action: StepAction,

    /// Unconditional successor, used when no branch table is present.
    pub next_step: Option<String>,

    /// Step to run if this step fails; absent means a failure here is
    /// terminal for the workflow.
    pub on_failure: Option<String>,

    /// Result value (canonical scalar string) to successor name. An empty
    /// map means the step has no branch table.
    pub branch: HashMap<String, String>,

    /// For parallel steps: whether the first sub-action failure aborts
    /// the rest. Ignored for non-parallel steps.
    pub stop_on_failure: bool,
}

impl Step {
    /// Creates a step that invokes a single action.
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into().trim().to_string(),
            action: StepAction::Single(action),
            next_step: None,
            on_failure: None,
            branch: HashMap::new(),
            stop_on_failure: false,
        }
    }

    /// Creates a step that runs named sub-actions concurrently.
    pub fn parallel<N>(
        name: impl Into<String>,
        actions: impl IntoIterator<Item = (N, Action)>,
    ) -> Self
    where
        N: Into<String>,
    {
        let actions = actions
            .into_iter()
            .map(|(sub, action)| (sub.into(), action))
            .collect();

        Self {
            name: name.into().trim().to_string(),
            action: StepAction::Parallel(actions),
            next_step: None,
            on_failure: None,
            branch: HashMap::new(),
            stop_on_failure: false,
        }
    }

    /// Creates a step whose action is an entire nested workflow.
    pub fn sub_workflow(name: impl Into<String>, workflow: Workflow) -> Self {
        Self {
            name: name.into().trim().to_string(),
            action: StepAction::SubWorkflow(Box::new(workflow)),
            next_step: None,
            on_failure: None,
            branch: HashMap::new(),
            stop_on_failure: false,
        }
    }

    /// Sets the unconditional successor.
    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next_step = Some(next.into());
        self
    }

    /// Sets the failure handler step.
    pub fn with_on_failure(mut self, handler: impl Into<String>) -> Self {
        self.on_failure = Some(handler.into());
        self
    }

    /// Adds one branch table entry.
    pub fn with_branch(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.branch.insert(key.into(), target.into());
        self
    }

    /// Replaces the branch table.
    pub fn with_branch_table<K, T>(mut self, table: impl IntoIterator<Item = (K, T)>) -> Self
    where
        K: Into<String>,
        T: Into<String>,
    {
        self.branch = table
            .into_iter()
            .map(|(k, t)| (k.into(), t.into()))
            .collect();
        self
    }

    /// Sets the stop-on-failure policy for a parallel step.
    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    /// Returns true if this step fans out parallel sub-actions.
    pub fn is_parallel(&self) -> bool {
        matches!(self.action, StepAction::Parallel(_))
    }
}

/// A named, directed graph of steps plus the state of its single run.
///
/// Steps are registered with [`add_step`](Workflow::add_step) before
/// execution; the walk starts at the entry step (first registered, or the
/// one set with [`set_entry`](Workflow::set_entry)). The accumulated
/// [`ExecutionContext`] and the terminal status are readable afterwards.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub(crate) name: String,
    pub(crate) steps: Vec<Step>,
    pub(crate) entry: Option<String>,
    pub(crate) context: ExecutionContext,
    pub(crate) status: WorkflowStatus,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            entry: None,
            context: ExecutionContext::new(),
            status: WorkflowStatus::Initialized,
        }
    }

    /// Registers a step.
    ///
    /// Fails without mutating the workflow if the step name is empty or
    /// already taken, if a parallel step carries an empty action map, or
    /// if the instance has already started executing.
    pub fn add_step(&mut self, step: Step) -> Result<(), WorkflowError> {
        if self.status != WorkflowStatus::Initialized {
            return Err(WorkflowError::AlreadyExecuted(self.name.clone()));
        }

        if step.name.is_empty() {
            return Err(WorkflowError::Configuration {
                name: String::new(),
                reason: "step name is empty".to_string(),
            });
        }

        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(WorkflowError::DuplicateStep(step.name));
        }

        if let StepAction::Parallel(actions) = &step.action {
            if actions.is_empty() {
                return Err(WorkflowError::Configuration {
                    name: step.name,
                    reason: "parallel step has an empty action map".to_string(),
                });
            }
        }

        debug!("workflow '{}': registered step '{}'", self.name, step.name);
        self.steps.push(step);
        Ok(())
    }

    /// Designates the entry step by name.
    ///
    /// Without an explicit entry, the walk starts at the first registered
    /// step. The name is checked against registered steps when execution
    /// starts.
    pub fn set_entry(&mut self, name: impl Into<String>) {
        self.entry = Some(name.into());
    }

    /// Returns the workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the registered steps in insertion order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns a step by name.
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Returns the entry step name (explicit, or first registered).
    pub fn entry(&self) -> Option<&str> {
        self.entry
            .as_deref()
            .or_else(|| self.steps.first().map(|s| s.name.as_str()))
    }

    /// Returns the current lifecycle status.
    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Returns the execution context (read-only).
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Returns the most recently produced success value.
    pub fn last_result(&self) -> Option<&Value> {
        self.context.last_result()
    }

    /// Returns the number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no steps are registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns a terminal instance to `Initialized` with a cleared
    /// context, allowing a fresh `execute` call.
    pub fn reset(&mut self) {
        debug!("workflow '{}': reset", self.name);
        self.context.clear();
        self.status = WorkflowStatus::Initialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> Action {
        Action::from_sync(|input| Ok(input))
    }

    #[test]
    fn test_step_builder() {
        let step = Step::new("classify", noop())
            .with_next("publish")
            .with_on_failure("report")
            .with_branch("ok", "publish")
            .with_branch("spam", "quarantine");

        assert_eq!(step.name, "classify");
        assert_eq!(step.next_step, Some("publish".to_string()));
        assert_eq!(step.on_failure, Some("report".to_string()));
        assert_eq!(step.branch.len(), 2);
        assert_eq!(step.branch.get("spam"), Some(&"quarantine".to_string()));
        assert!(!step.is_parallel());
    }

    #[test]
    fn test_step_name_trimmed() {
        let step = Step::new("  padded  ", noop());
        assert_eq!(step.name, "padded");
    }

    #[test]
    fn test_parallel_step_builder() {
        let step =
            Step::parallel("fanout", [("a", noop()), ("b", noop())]).with_stop_on_failure(true);

        assert!(step.is_parallel());
        assert!(step.stop_on_failure);
        match &step.action {
            StepAction::Parallel(actions) => assert_eq!(actions.len(), 2),
            _ => panic!("expected parallel action"),
        }
    }

    #[test]
    fn test_branch_table_replaces() {
        let step = Step::new("check", noop())
            .with_branch("old", "gone")
            .with_branch_table([("ok", "next"), ("bad", "fix")]);

        assert_eq!(step.branch.len(), 2);
        assert!(!step.branch.contains_key("old"));
    }

    #[test]
    fn test_workflow_add_step() {
        let mut workflow = Workflow::new("test");
        assert!(workflow.add_step(Step::new("a", noop())).is_ok());
        assert_eq!(workflow.len(), 1);
        assert!(!workflow.is_empty());
    }

    #[test]
    fn test_duplicate_step_rejected_atomically() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Step::new("a", noop())).unwrap();

        let err = workflow.add_step(Step::new("a", noop())).unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateStep(name) if name == "a"));
        assert_eq!(workflow.len(), 1);
    }

    #[test]
    fn test_empty_parallel_map_rejected() {
        let mut workflow = Workflow::new("test");
        let empty: Vec<(String, Action)> = Vec::new();

        let err = workflow
            .add_step(Step::parallel("fanout", empty))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration { .. }));
        assert!(workflow.is_empty());
    }

    #[test]
    fn test_empty_step_name_rejected() {
        let mut workflow = Workflow::new("test");
        let err = workflow.add_step(Step::new("   ", noop())).unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration { .. }));
    }

    #[test]
    fn test_add_step_after_run_rejected() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Step::new("a", noop())).unwrap();
        workflow.status = WorkflowStatus::Completed;

        let err = workflow.add_step(Step::new("b", noop())).unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyExecuted(_)));
    }

    #[test]
    fn test_entry_defaults_to_first_step() {
        let mut workflow = Workflow::new("test");
        assert_eq!(workflow.entry(), None);

        workflow.add_step(Step::new("first", noop())).unwrap();
        workflow.add_step(Step::new("second", noop())).unwrap();
        assert_eq!(workflow.entry(), Some("first"));
    }

    #[test]
    fn test_explicit_entry() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Step::new("first", noop())).unwrap();
        workflow.add_step(Step::new("second", noop())).unwrap();
        workflow.set_entry("second");

        assert_eq!(workflow.entry(), Some("second"));
    }

    #[test]
    fn test_get_step() {
        let mut workflow = Workflow::new("test");
        workflow
            .add_step(Step::new("a", noop()).with_next("b"))
            .unwrap();

        assert!(workflow.get_step("a").is_some());
        assert!(workflow.get_step("missing").is_none());
    }

    #[test]
    fn test_new_workflow_state() {
        let workflow = Workflow::new("fresh");
        assert_eq!(workflow.name(), "fresh");
        assert_eq!(workflow.status(), WorkflowStatus::Initialized);
        assert!(workflow.context().is_empty());
        assert!(workflow.last_result().is_none());
    }

    #[test]
    fn test_reset_clears_run_state() {
        use crate::workflow::context::StepOutcome;

        let mut workflow = Workflow::new("test");
        workflow.add_step(Step::new("a", noop())).unwrap();
        workflow.status = WorkflowStatus::Failed;
        workflow.context.record("a", StepOutcome::Success(json!(1)));

        workflow.reset();

        assert_eq!(workflow.status(), WorkflowStatus::Initialized);
        assert!(workflow.context().is_empty());
        assert!(workflow.last_result().is_none());
        assert_eq!(workflow.len(), 1);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!WorkflowStatus::Initialized.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(WorkflowStatus::Completed.to_string(), "completed");
        assert_eq!(WorkflowStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_sub_workflow_step() {
        let mut child = Workflow::new("child");
        child.add_step(Step::new("inner", noop())).unwrap();

        let step = Step::sub_workflow("nested", child);
        match &step.action {
            StepAction::SubWorkflow(wf) => assert_eq!(wf.name(), "child"),
            _ => panic!("expected sub-workflow action"),
        }
    }
}
