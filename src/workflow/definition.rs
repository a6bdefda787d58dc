//! Workflow Definitions
//!
//! Declarative routing skeletons. A definition carries the graph shape
//! (step names, routing rules, and action names), while the actions
//! themselves stay opaque callables supplied by the caller through an
//! [`ActionRegistry`]. Binding a definition against a registry produces a
//! ready-to-execute [`Workflow`].
//!
//! Sub-workflow steps are not expressible declaratively; nested workflows
//! are composed programmatically.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: ingest
//! entry: fetch
//! steps:
//!   - name: fetch
//!     action: fetch_feed
//!     next: classify
//!     on_failure: report
//!
//!   - name: classify
//!     action: classify_items
//!     branch:
//!       ok: store
//!       empty: report
//!
//!   - name: store
//!     parallel: true
//!     stop_on_failure: true
//!     actions:
//!       db: store_db
//!       cache: store_cache
//!
//!   - name: report
//!     action: report_outcome
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::execution::action::Action;

use super::error::WorkflowError;
use super::model::{Step, Workflow};

/// Named actions available for binding into definitions.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Action>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under a name, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, action: Action) -> &mut Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Returns the action registered under a name.
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Returns the number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Declarative form of a single step.
#[derive(Debug, Clone, Deserialize)]
pub struct StepDefinition {
    /// Step name, unique within the definition.
    pub name: String,

    /// Action name for a non-parallel step.
    #[serde(default)]
    pub action: Option<String>,

    /// Sub-action name to action name, for a parallel step.
    #[serde(default)]
    pub actions: HashMap<String, String>,

    /// Unconditional successor.
    #[serde(default)]
    pub next: Option<String>,

    /// Failure handler step.
    #[serde(default)]
    pub on_failure: Option<String>,

    /// Branch table: result value to successor name.
    #[serde(default)]
    pub branch: HashMap<String, String>,

    /// Whether this step fans out `actions` concurrently.
    #[serde(default)]
    pub parallel: bool,

    /// Stop-on-failure policy for a parallel step.
    #[serde(default)]
    pub stop_on_failure: bool,
}

/// Declarative form of a whole workflow graph.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name.
    pub name: String,

    /// Explicit entry step; defaults to the first listed step.
    #[serde(default)]
    pub entry: Option<String>,

    /// Step definitions in registration order.
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    /// Parses a definition from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, WorkflowError> {
        let definition: Self = serde_yaml::from_str(text)?;
        debug!(
            "parsed definition '{}' with {} steps",
            definition.name,
            definition.steps.len()
        );
        Ok(definition)
    }

    /// Loads a definition from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        info!("loading workflow definition from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Binds action names against a registry, producing a workflow.
    ///
    /// Steps are registered through [`Workflow::add_step`], so duplicate
    /// names and malformed parallel steps surface as the same
    /// configuration errors programmatic construction produces.
    pub fn bind(&self, registry: &ActionRegistry) -> Result<Workflow, WorkflowError> {
        let mut workflow = Workflow::new(&self.name);

        for def in &self.steps {
            let mut step = self.bind_step(def, registry)?;

            if let Some(next) = &def.next {
                step = step.with_next(next);
            }
            if let Some(handler) = &def.on_failure {
                step = step.with_on_failure(handler);
            }
            if !def.branch.is_empty() {
                step = step.with_branch_table(def.branch.clone());
            }
            step = step.with_stop_on_failure(def.stop_on_failure);

            workflow.add_step(step)?;
        }

        if let Some(entry) = &self.entry {
            workflow.set_entry(entry);
        }

        info!(
            "bound definition '{}' into a workflow with {} steps",
            self.name,
            workflow.len()
        );
        Ok(workflow)
    }

    fn bind_step(
        &self,
        def: &StepDefinition,
        registry: &ActionRegistry,
    ) -> Result<Step, WorkflowError> {
        if def.parallel {
            if def.action.is_some() {
                return Err(WorkflowError::Configuration {
                    name: def.name.clone(),
                    reason: "parallel step must define an action map, not a single action"
                        .to_string(),
                });
            }
            if def.actions.is_empty() {
                return Err(WorkflowError::Configuration {
                    name: def.name.clone(),
                    reason: "parallel step defines no actions".to_string(),
                });
            }

            let mut actions = Vec::with_capacity(def.actions.len());
            for (sub, action_name) in &def.actions {
                let action = self.lookup(registry, &def.name, action_name)?;
                actions.push((sub.clone(), action));
            }
            return Ok(Step::parallel(&def.name, actions));
        }

        if !def.actions.is_empty() {
            return Err(WorkflowError::Configuration {
                name: def.name.clone(),
                reason: "non-parallel step defines an action map".to_string(),
            });
        }

        let action_name = def.action.as_ref().ok_or_else(|| WorkflowError::Configuration {
            name: def.name.clone(),
            reason: "step defines no action".to_string(),
        })?;

        let action = self.lookup(registry, &def.name, action_name)?;
        Ok(Step::new(&def.name, action))
    }

    fn lookup(
        &self,
        registry: &ActionRegistry,
        step: &str,
        action: &str,
    ) -> Result<Action, WorkflowError> {
        registry
            .get(action)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownAction {
                step: step.to_string(),
                action: action.to_string(),
            })
    }
}
