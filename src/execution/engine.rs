//! Workflow Execution Engine
//!
//! The core engine that walks a workflow's step graph:
//! - Runs each step's action (single, parallel fan-out, or nested
//!   sub-workflow) with the carried value as input
//! - Records every outcome in the execution context
//! - Routes to the successor via the branch table, the static `next_step`,
//!   or the step's failure handler
//! - Terminates with `Completed` at a step with no destination, or
//!   `Failed` on an unhandled failure
//!
//! Sequential steps never overlap; concurrency exists only inside a
//! parallel step's fan-out. The walk itself is a single async control
//! flow that suspends while awaiting an action, a fan-in, or a nested
//! workflow's terminal status.

use std::future::Future;
use std::pin::Pin;

use log::{debug, error, info, warn};
use serde_json::{json, Value};

use crate::monitoring::timeline::{EventType, ExecutionTimeline};
use crate::workflow::context::{Failure, StepOutcome};
use crate::workflow::error::WorkflowError;
use crate::workflow::model::{StepAction, Workflow, WorkflowStatus};
use crate::workflow::router;
use crate::workflow::validator::validate_workflow;

use super::parallel::{run_parallel, ParallelOutcome};

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Terminal status of the walk.
    pub status: WorkflowStatus,
    /// The most recently produced success value, if any.
    pub last_result: Option<Value>,
    /// Number of step executions performed (handler loops count each visit).
    pub steps_executed: usize,
    /// Per-step timing of the run.
    pub timeline: ExecutionTimeline,
}

/// Tunables threaded through a walk and into nested walks.
#[derive(Debug, Clone)]
pub(crate) struct EngineOptions {
    pub(crate) max_parallel: usize,
    pub(crate) max_hops: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_parallel: num_cpus::get(),
            max_hops: None,
        }
    }
}

/// Workflow execution engine.
///
/// A configurable front over [`Workflow::execute`]: owns the workflow,
/// exposes tunables, and hands the workflow back for inspection after the
/// run.
///
/// # Example
///
/// ```no_run
/// use flowrunner::execution::action::Action;
/// use flowrunner::execution::engine::Engine;
/// use flowrunner::workflow::model::{Step, Workflow};
/// use serde_json::json;
///
/// # async fn demo() -> Result<(), flowrunner::workflow::error::WorkflowError> {
/// let mut workflow = Workflow::new("pipeline");
/// workflow.add_step(Step::new("only", Action::from_sync(|input| Ok(input))))?;
///
/// let mut engine = Engine::new(workflow);
/// engine.set_max_parallel(4);
/// engine.set_max_hops(1000);
///
/// let report = engine.run(json!("start")).await?;
/// println!("finished: {}", report.status);
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    workflow: Workflow,
    options: EngineOptions,
}

impl Engine {
    /// Creates a new execution engine for a workflow.
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            options: EngineOptions::default(),
        }
    }

    /// Sets the concurrency bound for parallel steps.
    pub fn set_max_parallel(&mut self, max: usize) {
        self.options.max_parallel = max;
    }

    /// Sets a ceiling on step executions, as a guard against authoring
    /// mistakes that loop forever. Unset by default.
    pub fn set_max_hops(&mut self, max: usize) {
        self.options.max_hops = Some(max);
    }

    /// Executes the workflow from its entry step.
    pub async fn run(&mut self, input: Value) -> Result<ExecutionReport, WorkflowError> {
        let options = self.options.clone();
        drive(&mut self.workflow, input, &options).await
    }

    /// Returns the owned workflow for inspection.
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Returns a terminal workflow to `Initialized` for another run.
    pub fn reset(&mut self) {
        self.workflow.reset();
    }

    /// Consumes the engine, handing the workflow back.
    pub fn into_workflow(self) -> Workflow {
        self.workflow
    }
}

impl Workflow {
    /// Executes the workflow from its entry step with default engine
    /// tunables (parallel bound of `num_cpus::get()`, no hop ceiling).
    ///
    /// Single-shot: a running or terminated instance refuses re-execution
    /// with [`WorkflowError::AlreadyExecuted`]; call
    /// [`reset`](Workflow::reset) first to reuse the instance.
    pub async fn execute(&mut self, input: Value) -> Result<ExecutionReport, WorkflowError> {
        drive(self, input, &EngineOptions::default()).await
    }
}

type DriveFuture<'a> = Pin<Box<dyn Future<Output = Result<ExecutionReport, WorkflowError>> + Send + 'a>>;

/// The walk. Boxed so sub-workflow steps can recurse.
pub(crate) fn drive<'a>(
    workflow: &'a mut Workflow,
    input: Value,
    options: &'a EngineOptions,
) -> DriveFuture<'a> {
    Box::pin(async move {
        if workflow.status != WorkflowStatus::Initialized {
            return Err(WorkflowError::AlreadyExecuted(workflow.name.clone()));
        }

        validate_workflow(workflow)?;

        let entry = workflow
            .entry()
            .map(str::to_string)
            .ok_or_else(|| WorkflowError::EmptyWorkflow(workflow.name.clone()))?;

        info!("workflow '{}': starting at step '{}'", workflow.name, entry);
        workflow.status = WorkflowStatus::Running;

        let mut timeline = ExecutionTimeline::new();
        let mut current = entry;
        // The value fed to the next action: the external input until the
        // first success, the latest success value afterwards.
        let mut carry = input;
        let mut hops = 0usize;

        loop {
            if let Some(max) = options.max_hops {
                if hops >= max {
                    error!(
                        "workflow '{}': hop budget of {} exhausted at step '{}'",
                        workflow.name, max, current
                    );
                    workflow.context.record(
                        &current,
                        StepOutcome::Failure(Failure::action(format!(
                            "hop budget of {} exhausted",
                            max
                        ))),
                    );
                    workflow.status = WorkflowStatus::Failed;
                    break;
                }
            }
            hops += 1;

            debug!("workflow '{}': hop {}: step '{}'", workflow.name, hops, current);
            timeline.add_event(current.clone(), EventType::Started);

            let step_index = workflow
                .steps
                .iter()
                .position(|s| s.name == current)
                .ok_or_else(|| WorkflowError::UnknownStep(current.clone()))?;

            // Run the step's action(s). Only the step itself is borrowed
            // across the awaits; the context is untouched until fan-in.
            let outcome = {
                let step = &mut workflow.steps[step_index];
                let stop_on_failure = step.stop_on_failure;

                match &mut step.action {
                    StepAction::Single(action) => {
                        let action = action.clone();
                        match action.invoke(carry.clone()).await {
                            Ok(value) => StepOutcome::Success(value),
                            Err(err) => StepOutcome::Failure(Failure::action(err.to_string())),
                        }
                    }
                    StepAction::Parallel(actions) => {
                        let fan_in = run_parallel(
                            &current,
                            actions,
                            &carry,
                            stop_on_failure,
                            options.max_parallel,
                        )
                        .await;

                        match fan_in {
                            ParallelOutcome::Success(value) => StepOutcome::Success(value),
                            ParallelOutcome::Failure(failure) => StepOutcome::Failure(failure),
                            ParallelOutcome::Partial(subs) => StepOutcome::Partial(subs),
                        }
                    }
                    StepAction::SubWorkflow(child) => {
                        // Handler loops may revisit this step; give the
                        // child a fresh run each time.
                        if child.status.is_terminal() {
                            child.reset();
                        }

                        let child_name = child.name.clone();
                        info!("step '{}': running sub-workflow '{}'", current, child_name);

                        let nested = drive(child, carry.clone(), options).await;
                        match nested {
                            Ok(report) if report.status == WorkflowStatus::Completed => {
                                StepOutcome::Success(json!({
                                    "status": report.status.to_string(),
                                    "result": report.last_result.unwrap_or(Value::Null),
                                }))
                            }
                            Ok(report) => StepOutcome::Failure(Failure::sub_workflow(format!(
                                "sub-workflow '{}' terminated {}",
                                child_name, report.status
                            ))),
                            Err(err) => StepOutcome::Failure(Failure::sub_workflow(format!(
                                "sub-workflow '{}' could not run: {}",
                                child_name, err
                            ))),
                        }
                    }
                }
            };

            match outcome {
                StepOutcome::Success(value) => {
                    workflow
                        .context
                        .record(&current, StepOutcome::Success(value.clone()));

                    let step = &workflow.steps[step_index];
                    match router::resolve_successor(step, &value) {
                        Ok(Some(next)) => {
                            debug!("step '{}' completed, next: '{}'", current, next);
                            timeline.add_event(current.clone(), EventType::Completed);
                            carry = value;
                            current = next;
                        }
                        Ok(None) => {
                            timeline.add_event(current.clone(), EventType::Completed);
                            workflow.status = WorkflowStatus::Completed;
                            break;
                        }
                        Err(branch_failure) => {
                            warn!("step '{}': {}", current, branch_failure);
                            timeline.add_event(current.clone(), EventType::Failed);
                            // The step failed to route: its entry becomes
                            // the branch failure (last_result keeps the
                            // produced value).
                            workflow
                                .context
                                .record(&current, StepOutcome::Failure(branch_failure));

                            match router::failure_handler(step) {
                                Some(handler) => {
                                    let handler = handler.to_string();
                                    warn!("step '{}': routing to failure handler '{}'", current, handler);
                                    carry = value;
                                    current = handler;
                                }
                                None => {
                                    error!("step '{}': branch failure is terminal", current);
                                    workflow.status = WorkflowStatus::Failed;
                                    break;
                                }
                            }
                        }
                    }
                }
                StepOutcome::Failure(failure) => {
                    timeline.add_event(current.clone(), EventType::Failed);
                    workflow
                        .context
                        .record(&current, StepOutcome::Failure(failure.clone()));

                    let step = &workflow.steps[step_index];
                    match router::failure_handler(step) {
                        Some(handler) => {
                            let handler = handler.to_string();
                            warn!(
                                "step '{}' failed ({}), routing to handler '{}'",
                                current, failure, handler
                            );
                            current = handler;
                        }
                        None => {
                            error!("step '{}' failed with no handler: {}", current, failure);
                            workflow.status = WorkflowStatus::Failed;
                            break;
                        }
                    }
                }
                StepOutcome::Partial(subs) => {
                    // Tolerant parallel step with failures inside: the
                    // composite is surfaced, never routed. Branch tables
                    // are not consulted (there is no scalar to match).
                    let failed = subs.values().filter(|s| !s.is_success()).count();
                    warn!(
                        "step '{}': {}/{} sub-actions failed, surfacing composite",
                        current,
                        failed,
                        subs.len()
                    );
                    timeline.add_event(current.clone(), EventType::Completed);
                    workflow.context.record(&current, StepOutcome::Partial(subs));

                    let next = workflow.steps[step_index].next_step.clone();
                    match next {
                        Some(next) => current = next,
                        None => {
                            workflow.status = WorkflowStatus::Completed;
                            break;
                        }
                    }
                }
            }
        }

        let report = ExecutionReport {
            status: workflow.status,
            last_result: workflow.context.last_result().cloned(),
            steps_executed: hops,
            timeline,
        };

        info!(
            "workflow '{}' finished: {} ({} steps, {:.2?})",
            workflow.name,
            report.status,
            report.steps_executed,
            report.timeline.elapsed()
        );

        Ok(report)
    })
}
