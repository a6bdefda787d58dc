//! Parallel Coordinator
//!
//! Fans the named action map of a parallel step out onto concurrent tokio
//! tasks, bounded by a semaphore, and fans back in according to the step's
//! stop-on-failure policy:
//!
//! - `stop_on_failure = true`: the first sub-action failure wins, siblings
//!   receive a cooperative abort, and the step's outcome is that single
//!   failure.
//! - `stop_on_failure = false`: every sub-action runs to settle; the
//!   outcome is either a success object (all succeeded) or a composite
//!   mapping each sub-action name to its individual result-or-failure.
//!
//! Sub-action completion order is unspecified; callers must not rely on it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, warn};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::workflow::context::{Failure, SubActionOutcome};

use super::action::{Action, ActionError};

/// Fan-in result of a parallel step, before the engine records it.
#[derive(Debug)]
pub(crate) enum ParallelOutcome {
    /// Every sub-action succeeded; the value is an object mapping
    /// sub-action name to its result.
    Success(Value),
    /// Stop-on-failure policy: the first failure, naming the sub-action.
    Failure(Failure),
    /// Tolerant policy with at least one failure: the full composite.
    Partial(BTreeMap<String, SubActionOutcome>),
}

/// Runs all sub-actions of a parallel step concurrently.
pub(crate) async fn run_parallel(
    step_name: &str,
    actions: &HashMap<String, Action>,
    input: &Value,
    stop_on_failure: bool,
    max_parallel: usize,
) -> ParallelOutcome {
    debug!(
        "step '{}': fanning out {} sub-actions (stop_on_failure: {}, max parallel: {})",
        step_name,
        actions.len(),
        stop_on_failure,
        max_parallel
    );

    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks = JoinSet::new();

    for (name, action) in actions {
        let name = name.clone();
        let action = action.clone();
        let input = input.clone();
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            // acquire_owned only errs on a closed semaphore, which this
            // coordinator never does
            let _permit = semaphore.acquire_owned().await.ok();
            (name, action.invoke(input).await)
        });
    }

    if stop_on_failure {
        join_first_failure(step_name, tasks).await
    } else {
        join_all(step_name, actions, tasks).await
    }
}

/// Fan-in for `stop_on_failure = true`: the first failure aborts the rest.
async fn join_first_failure(
    step_name: &str,
    mut tasks: JoinSet<(String, Result<Value, ActionError>)>,
) -> ParallelOutcome {
    let mut successes = Map::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(value))) => {
                debug!("step '{}': sub-action '{}' succeeded", step_name, name);
                successes.insert(name, value);
            }
            Ok((name, Err(err))) => {
                warn!(
                    "step '{}': sub-action '{}' failed, aborting siblings: {}",
                    step_name, name, err
                );
                tasks.abort_all();
                return ParallelOutcome::Failure(Failure::action(format!(
                    "sub-action '{}' failed: {}",
                    name, err
                )));
            }
            Err(join_err) if join_err.is_cancelled() => {}
            Err(join_err) => {
                tasks.abort_all();
                return ParallelOutcome::Failure(Failure::action(format!(
                    "a sub-action of step '{}' panicked: {}",
                    step_name, join_err
                )));
            }
        }
    }

    ParallelOutcome::Success(Value::Object(successes))
}

/// Fan-in for `stop_on_failure = false`: everything runs to settle.
async fn join_all(
    step_name: &str,
    actions: &HashMap<String, Action>,
    mut tasks: JoinSet<(String, Result<Value, ActionError>)>,
) -> ParallelOutcome {
    let mut outcomes: BTreeMap<String, SubActionOutcome> = BTreeMap::new();
    let mut any_failed = false;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(value))) => {
                outcomes.insert(name, SubActionOutcome::Success(value));
            }
            Ok((name, Err(err))) => {
                warn!("step '{}': sub-action '{}' failed: {}", step_name, name, err);
                any_failed = true;
                outcomes.insert(name, SubActionOutcome::Failure(Failure::action(err.to_string())));
            }
            Err(join_err) => {
                warn!(
                    "step '{}': a sub-action task did not settle: {}",
                    step_name, join_err
                );
            }
        }
    }

    // A panicked task never reported its name; anything missing from the
    // fan-in is recorded as a failed sub-action.
    for name in actions.keys() {
        if !outcomes.contains_key(name) {
            any_failed = true;
            outcomes.insert(
                name.clone(),
                SubActionOutcome::Failure(Failure::action("sub-action panicked")),
            );
        }
    }

    if any_failed {
        ParallelOutcome::Partial(outcomes)
    } else {
        let object = outcomes
            .into_iter()
            .map(|(name, outcome)| match outcome {
                SubActionOutcome::Success(value) => (name, value),
                SubActionOutcome::Failure(_) => unreachable!("no failures recorded"),
            })
            .collect::<Map<String, Value>>();
        ParallelOutcome::Success(Value::Object(object))
    }
}
