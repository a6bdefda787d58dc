//! Execution Context Store
//!
//! Holds the recorded outcome of every executed step, keyed by step name,
//! in the order steps first complete. The store is append-only during a
//! run: re-running a step (a failure handler that loops back) overwrites
//! its entry in place, nothing is ever deleted. The store is cleared only
//! when a workflow instance is reset for a fresh run.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// What produced a [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The step's action returned an error (or its task panicked).
    Action,
    /// The step's result matched no key in its branch table.
    Branch,
    /// A nested sub-workflow terminated failed.
    SubWorkflow,
}

/// Descriptor for a failed step, recorded in the context and eligible
/// for `on_failure` routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// What produced the failure.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
}

impl Failure {
    /// Creates an action failure.
    pub fn action(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Action,
            message: message.into(),
        }
    }

    /// Creates a branch resolution failure.
    pub fn branch(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Branch,
            message: message.into(),
        }
    }

    /// Creates a sub-workflow failure.
    pub fn sub_workflow(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::SubWorkflow,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of a single sub-action inside a tolerant parallel step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubActionOutcome {
    /// The sub-action produced a value.
    Success(Value),
    /// The sub-action failed.
    Failure(Failure),
}

impl SubActionOutcome {
    /// Returns true if this sub-action succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Recorded outcome of an executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step produced a value. For a fully-successful parallel step
    /// this is an object mapping sub-action name to value; for a
    /// sub-workflow step it is the lifted `{status, result}` composite.
    Success(Value),
    /// The step failed (action error, branch miss, nested failure, or a
    /// stop-on-failure parallel step whose first failure won).
    Failure(Failure),
    /// Composite outcome of a tolerant (`stop_on_failure = false`)
    /// parallel step where at least one sub-action failed. Not routed:
    /// downstream logic inspects it through the context.
    Partial(BTreeMap<String, SubActionOutcome>),
}

impl StepOutcome {
    /// Returns true for a `Success` outcome.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true for a `Failure` outcome.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the success value, if any.
    pub fn success_value(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the failure descriptor, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

/// One recorded entry: a step name and its latest outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    /// Name of the step.
    pub step: String,
    /// Latest recorded outcome for the step.
    pub outcome: StepOutcome,
}

/// Append-accumulating record of every executed step's outcome.
///
/// Entries keep the order in which steps first completed; re-recording a
/// step updates its outcome in place. `last_result` tracks the most
/// recently produced `Success` value and is the input carried to the next
/// step's action.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionContext {
    entries: Vec<ContextEntry>,
    last_result: Option<Value>,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for a step.
    ///
    /// Appends a new entry, or overwrites the existing entry for the same
    /// step name in place. A `Success` outcome also updates `last_result`;
    /// `Failure` and `Partial` leave it untouched.
    pub fn record(&mut self, step: impl Into<String>, outcome: StepOutcome) {
        let step = step.into();

        if let StepOutcome::Success(value) = &outcome {
            self.last_result = Some(value.clone());
        }

        match self.entries.iter_mut().find(|e| e.step == step) {
            Some(entry) => entry.outcome = outcome,
            None => self.entries.push(ContextEntry { step, outcome }),
        }
    }

    /// Returns the recorded outcome for a step, or `None` if the step has
    /// not executed yet.
    pub fn get(&self, step: &str) -> Option<&StepOutcome> {
        self.entries
            .iter()
            .find(|e| e.step == step)
            .map(|e| &e.outcome)
    }

    /// Returns all entries in first-completion order.
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Returns the most recently produced success value.
    pub fn last_result(&self) -> Option<&Value> {
        self.last_result.as_ref()
    }

    /// Returns the number of recorded steps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears all recorded outcomes and the last result.
    ///
    /// Called only when a workflow instance is reset for a fresh run.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_get() {
        let mut context = ExecutionContext::new();
        context.record("fetch", StepOutcome::Success(json!({"rows": 3})));

        let outcome = context.get("fetch").unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.success_value().unwrap(), &json!({"rows": 3}));
        assert!(context.get("parse").is_none());
    }

    #[test]
    fn test_success_updates_last_result() {
        let mut context = ExecutionContext::new();
        assert!(context.last_result().is_none());

        context.record("a", StepOutcome::Success(json!(1)));
        assert_eq!(context.last_result(), Some(&json!(1)));

        context.record("b", StepOutcome::Failure(Failure::action("boom")));
        assert_eq!(context.last_result(), Some(&json!(1)));

        context.record("c", StepOutcome::Success(json!(2)));
        assert_eq!(context.last_result(), Some(&json!(2)));
    }

    #[test]
    fn test_partial_does_not_update_last_result() {
        let mut context = ExecutionContext::new();
        context.record("a", StepOutcome::Success(json!("keep")));

        let mut subs = BTreeMap::new();
        subs.insert("x".to_string(), SubActionOutcome::Success(json!(1)));
        subs.insert(
            "y".to_string(),
            SubActionOutcome::Failure(Failure::action("boom")),
        );
        context.record("fanout", StepOutcome::Partial(subs));

        assert_eq!(context.last_result(), Some(&json!("keep")));
    }

    #[test]
    fn test_rerecord_overwrites_in_place() {
        let mut context = ExecutionContext::new();
        context.record("a", StepOutcome::Failure(Failure::action("first try")));
        context.record("b", StepOutcome::Success(json!("handled")));
        context.record("a", StepOutcome::Success(json!("second try")));

        // Entry order is first-completion order; the outcome is the latest.
        assert_eq!(context.len(), 2);
        assert_eq!(context.entries()[0].step, "a");
        assert_eq!(context.entries()[1].step, "b");
        assert!(context.get("a").unwrap().is_success());
    }

    #[test]
    fn test_entries_preserve_completion_order() {
        let mut context = ExecutionContext::new();
        context.record("a", StepOutcome::Success(json!(1)));
        context.record("b", StepOutcome::Success(json!(2)));
        context.record("c", StepOutcome::Success(json!(3)));

        let names: Vec<_> = context.entries().iter().map(|e| e.step.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_clear() {
        let mut context = ExecutionContext::new();
        context.record("a", StepOutcome::Success(json!(1)));

        context.clear();

        assert!(context.is_empty());
        assert!(context.last_result().is_none());
    }

    #[test]
    fn test_failure_accessors() {
        let failure = Failure::branch("no key 'x'");
        let outcome = StepOutcome::Failure(failure.clone());

        assert!(outcome.is_failure());
        assert!(!outcome.is_success());
        assert_eq!(outcome.failure(), Some(&failure));
        assert_eq!(outcome.success_value(), None);
        assert_eq!(failure.kind, FailureKind::Branch);
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = StepOutcome::Failure(Failure::sub_workflow("nested run failed"));
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("sub_workflow"));
        assert!(json.contains("nested run failed"));
    }
}
