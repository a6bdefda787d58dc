//! Workflow Validation
//!
//! Pre-flight checks run before the first hop of a walk:
//! - Workflow has at least one step
//! - The entry step resolves to a registered step
//! - Every routing target (`next_step`, `on_failure`, branch values)
//!   names a registered step
//!
//! Routing mistakes surface here as [`WorkflowError`]s before any action
//! runs, instead of mid-walk.

use std::collections::HashSet;

use log::debug;

use super::error::WorkflowError;
use super::model::Workflow;

/// Validates the workflow graph.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    if workflow.is_empty() {
        return Err(WorkflowError::EmptyWorkflow(workflow.name().to_string()));
    }

    let names: HashSet<&str> = workflow.steps().iter().map(|s| s.name.as_str()).collect();

    if let Some(entry) = workflow.entry() {
        if !names.contains(entry) {
            return Err(WorkflowError::UnknownEntry {
                workflow: workflow.name().to_string(),
                entry: entry.to_string(),
            });
        }
    }

    for step in workflow.steps() {
        let targets = step
            .next_step
            .iter()
            .chain(step.on_failure.iter())
            .chain(step.branch.values());

        for target in targets {
            if !names.contains(target.as_str()) {
                return Err(WorkflowError::UnknownStepReference {
                    step: step.name.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    debug!(
        "workflow '{}': validated {} steps",
        workflow.name(),
        workflow.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::action::Action;
    use crate::workflow::model::Step;
    use serde_json::json;

    fn noop() -> Action {
        Action::from_sync(|_| Ok(json!(null)))
    }

    #[test]
    fn test_valid_workflow() {
        let mut workflow = Workflow::new("test");
        workflow
            .add_step(Step::new("a", noop()).with_next("b").with_on_failure("c"))
            .unwrap();
        workflow
            .add_step(Step::new("b", noop()).with_branch("done", "c"))
            .unwrap();
        workflow.add_step(Step::new("c", noop())).unwrap();

        assert!(validate_workflow(&workflow).is_ok());
    }

    #[test]
    fn test_empty_workflow_rejected() {
        let workflow = Workflow::new("empty");
        let err = validate_workflow(&workflow).unwrap_err();
        assert!(matches!(err, WorkflowError::EmptyWorkflow(_)));
    }

    #[test]
    fn test_unknown_entry_rejected() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Step::new("a", noop())).unwrap();
        workflow.set_entry("missing");

        let err = validate_workflow(&workflow).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownEntry { entry, .. } if entry == "missing"));
    }

    #[test]
    fn test_unknown_next_step_rejected() {
        let mut workflow = Workflow::new("test");
        workflow
            .add_step(Step::new("a", noop()).with_next("ghost"))
            .unwrap();

        let err = validate_workflow(&workflow).unwrap_err();
        assert!(
            matches!(err, WorkflowError::UnknownStepReference { target, .. } if target == "ghost")
        );
    }

    #[test]
    fn test_unknown_on_failure_rejected() {
        let mut workflow = Workflow::new("test");
        workflow
            .add_step(Step::new("a", noop()).with_on_failure("ghost"))
            .unwrap();

        let err = validate_workflow(&workflow).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownStepReference { .. }));
    }

    #[test]
    fn test_unknown_branch_target_rejected() {
        let mut workflow = Workflow::new("test");
        workflow
            .add_step(Step::new("a", noop()).with_branch("ok", "ghost"))
            .unwrap();

        let err = validate_workflow(&workflow).unwrap_err();
        assert!(
            matches!(err, WorkflowError::UnknownStepReference { step, target } if step == "a" && target == "ghost")
        );
    }

    #[test]
    fn test_self_reference_allowed() {
        // Loops are the author's responsibility; a handler pointing back
        // at its own step is legal.
        let mut workflow = Workflow::new("test");
        workflow
            .add_step(Step::new("retry", noop()).with_on_failure("retry"))
            .unwrap();

        assert!(validate_workflow(&workflow).is_ok());
    }
}
