//! Error types for binding and reconciliation.

use serde_json::Value;
use thiserror::Error;

/// Contract violations detected while applying bindings to a host node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    /// A binding was registered under an empty name.
    #[error("binding name must not be empty")]
    EmptyName,

    /// An `on:` binding without an event name.
    #[error("event binding `{0}` does not name an event")]
    MissingEvent(String),

    /// A `bind:` binding without a property name.
    #[error("two-way binding `{0}` does not name a property")]
    MissingProperty(String),

    /// The bound value has a different shape than the binding name asks for.
    #[error("binding `{name}` expects {expected}, got {found}")]
    Mismatch {
        /// The binding name as written.
        name: String,
        /// Shape required by the resolved binding kind.
        expected: &'static str,
        /// Shape that was supplied.
        found: &'static str,
    },
}

/// A rejected enter or exit transition.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("transition failed: {message}")]
pub struct TransitionError {
    /// Reason reported by the transition.
    pub message: String,
}

impl TransitionError {
    /// Create a transition error with the given reason.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while connecting or reconciling views.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A dynamic value of a shape that has no rendering (a map).
    #[error("value cannot be rendered: {0}")]
    UnrenderableValue(Value),

    /// A binding on an element was rejected.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The view has no position in a host tree.
    #[error("view is not connected")]
    NotConnected,

    /// `connect` was called on a view that is already mounted.
    #[error("view is already connected")]
    AlreadyConnected,

    /// One or more transitions rejected while settling.
    #[error("{} transition(s) failed", .0.len())]
    TransitionsFailed(Vec<TransitionError>),
}

/// Result type for view operations.
pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_descriptive() {
        let mismatch = BindError::Mismatch {
            name: "on:click".into(),
            expected: "an event handler",
            found: "a value",
        };
        assert_eq!(
            mismatch.to_string(),
            "binding `on:click` expects an event handler, got a value"
        );

        let render: RenderError = mismatch.clone().into();
        assert_eq!(render.to_string(), mismatch.to_string());

        let failed = RenderError::TransitionsFailed(vec![
            TransitionError::new("a"),
            TransitionError::new("b"),
        ]);
        assert_eq!(failed.to_string(), "2 transition(s) failed");
    }

    #[test]
    fn unrenderable_value_shows_json() {
        let error = RenderError::UnrenderableValue(serde_json::json!({ "a": 1 }));
        assert_eq!(error.to_string(), r#"value cannot be rendered: {"a":1}"#);
    }
}
