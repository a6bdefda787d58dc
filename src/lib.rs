//! FlowRunner - Routing Workflow Orchestration Engine
//!
//! A single-process, in-memory orchestrator that executes a named,
//! directed graph of steps. Each step invokes one or more opaque actions,
//! routes to a successor unconditionally or by branching on the action's
//! result, and can fan a set of actions out concurrently with
//! configurable failure tolerance.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`workflow`]: Data structures, routing rules, validation, and
//!   declarative definitions
//! - [`execution`]: The action capability and the execution engine with
//!   parallel fan-out and sub-workflow composition
//! - [`monitoring`]: Execution timing for run reports
//!
//! # Example
//!
//! ```rust,no_run
//! use flowrunner::execution::action::Action;
//! use flowrunner::workflow::model::{Step, Workflow};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flowrunner::workflow::error::WorkflowError> {
//!     let mut workflow = Workflow::new("ingest");
//!
//!     workflow.add_step(
//!         Step::new("fetch", Action::from_fn(|_| async { Ok(json!(["a", "b"])) }))
//!             .with_next("store")
//!             .with_on_failure("report"),
//!     )?;
//!     workflow.add_step(Step::new("store", Action::from_sync(|items| Ok(items))))?;
//!     workflow.add_step(Step::new("report", Action::from_sync(|input| Ok(input))))?;
//!
//!     let report = workflow.execute(json!(null)).await?;
//!     println!("{}: {:?}", report.status, report.last_result);
//!     Ok(())
//! }
//! ```

pub mod execution;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use execution::action::{Action, ActionError};
pub use execution::engine::{Engine, ExecutionReport};
pub use workflow::context::{ExecutionContext, Failure, FailureKind, StepOutcome, SubActionOutcome};
pub use workflow::definition::{ActionRegistry, WorkflowDefinition};
pub use workflow::error::WorkflowError;
pub use workflow::model::{Step, StepAction, Workflow, WorkflowStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FlowRunner";
