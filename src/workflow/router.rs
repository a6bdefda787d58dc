//! Step Routing
//!
//! Pure routing lookups used by the execution engine:
//! - Branch resolution: map a step's result value onto its branch table.
//! - Failure routing: look up a step's designated failure handler.
//!
//! Neither function has side effects; all control transfer happens in the
//! engine.

use serde_json::Value;

use super::context::Failure;
use super::model::Step;

/// Returns the branch key for a result value.
///
/// Branch tables key on the canonical string form of scalar results:
/// strings as-is, booleans and numbers via their display form. Non-scalar
/// results (objects, arrays, null) are not branchable.
pub fn branch_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolves the successor of a step that produced `result`.
///
/// A present branch table takes precedence: the result must match one of
/// its keys exactly, and a miss is a branch resolution failure (routed
/// like an action failure, never silently falling back to `next_step`).
/// Steps without a branch table route to `next_step`, or terminate when
/// none is set.
pub fn resolve_successor(step: &Step, result: &Value) -> Result<Option<String>, Failure> {
    if !step.branch.is_empty() {
        let key = branch_key(result).ok_or_else(|| {
            Failure::branch(format!(
                "step '{}': result {} is not a branchable scalar",
                step.name, result
            ))
        })?;

        return match step.branch.get(&key) {
            Some(target) => Ok(Some(target.clone())),
            None => Err(Failure::branch(format!(
                "step '{}': result '{}' matches no branch key",
                step.name, key
            ))),
        };
    }

    Ok(step.next_step.clone())
}

/// Returns the failure handler for a step, or `None` when a failure of
/// this step is terminal for the workflow.
pub fn failure_handler(step: &Step) -> Option<&str> {
    step.on_failure.as_deref()
}
