//! Action Capability
//!
//! An [`Action`] is the opaque unit of work a step invokes: it receives the
//! previous step's result as a [`serde_json::Value`] and resolves to a new
//! value or an [`ActionError`]. The engine never looks inside an action;
//! everything it needs for routing comes from the returned value.
//!
//! Actions are `Arc`-backed and cheap to clone, so the engine can snapshot
//! a step's action and invoke it without borrowing the workflow across an
//! await point.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Error returned by a failing action.
///
/// Opaque by design: the engine records the message in the execution
/// context and routes control, it does not interpret it. Actions that want
/// to retry do so internally before returning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActionError(String);

impl ActionError {
    /// Creates an action error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Boxed future produced by invoking an action.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Value, ActionError>> + Send>>;

type ActionFn = dyn Fn(Value) -> ActionFuture + Send + Sync;

/// An opaque, single-input, single-output-or-failure unit of work.
///
/// # Example
///
/// ```
/// use flowrunner::execution::action::{Action, ActionError};
/// use serde_json::json;
///
/// // Async action
/// let double = Action::from_fn(|input| async move {
///     let n = input.as_i64().ok_or_else(|| ActionError::new("not a number"))?;
///     Ok(json!(n * 2))
/// });
///
/// // Sync action
/// let greet = Action::from_sync(|input| Ok(json!(format!("hello {}", input))));
/// ```
#[derive(Clone)]
pub struct Action {
    func: Arc<ActionFn>,
}

impl Action {
    /// Creates an action from an async closure.
    pub fn from_fn<F, Fut>(func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        Self {
            func: Arc::new(move |input| Box::pin(func(input))),
        }
    }

    /// Creates an action from a synchronous closure.
    pub fn from_sync<F>(func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(move |input| {
                let result = func(input);
                Box::pin(async move { result })
            }),
        }
    }

    /// Invokes the action with the given input.
    pub fn invoke(&self, input: Value) -> ActionFuture {
        (self.func)(input)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_async_action_success() {
        let action = Action::from_fn(|input| async move {
            let n = input.as_i64().unwrap_or(0);
            Ok(json!(n + 1))
        });

        let result = action.invoke(json!(41)).await;
        assert_eq!(result.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_async_action_failure() {
        let action =
            Action::from_fn(|_| async move { Err::<Value, _>(ActionError::new("boom")) });

        let result = action.invoke(json!(null)).await;
        assert_eq!(result.unwrap_err().message(), "boom");
    }

    #[tokio::test]
    async fn test_sync_action() {
        let action = Action::from_sync(|input| Ok(json!(format!("got {}", input))));

        let result = action.invoke(json!("x")).await;
        assert_eq!(result.unwrap(), json!("got \"x\""));
    }

    #[tokio::test]
    async fn test_action_clone_shares_callable() {
        let action = Action::from_sync(|_| Ok(json!("shared")));
        let clone = action.clone();

        assert_eq!(action.invoke(json!(null)).await.unwrap(), json!("shared"));
        assert_eq!(clone.invoke(json!(null)).await.unwrap(), json!("shared"));
    }

    #[test]
    fn test_action_error_from_str() {
        let err: ActionError = "nope".into();
        assert_eq!(err.message(), "nope");
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_action_debug() {
        let action = Action::from_sync(|_| Ok(json!(null)));
        assert_eq!(format!("{:?}", action), "Action");
    }
}
