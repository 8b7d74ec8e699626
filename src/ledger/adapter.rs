//! Model adapter boundary: the ledger only needs "input in, prediction out".

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Failure raised by a model adapter. The ledger wraps it into
/// [`crate::core::errors::AbError::Adapter`] with the routing context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdapterError {
    /// Human-readable failure reason.
    pub message: String,
}

impl AdapterError {
    /// Build an error from any message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A model variant the ledger can invoke synchronously.
///
/// Implementations must be shareable across routing threads.
pub trait ModelAdapter: Send + Sync {
    /// Produce a prediction for one routed input.
    fn predict(&self, input: &Value) -> Result<Value, AdapterError>;
}

impl<F> ModelAdapter for F
where
    F: Fn(&Value) -> Result<Value, AdapterError> + Send + Sync,
{
    fn predict(&self, input: &Value) -> Result<Value, AdapterError> {
        self(input)
    }
}

/// Shared handle to a registered adapter.
pub type SharedAdapter = Arc<dyn ModelAdapter>;

/// Adapter that echoes its input back.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityAdapter;

impl ModelAdapter for IdentityAdapter {
    fn predict(&self, input: &Value) -> Result<Value, AdapterError> {
        Ok(input.clone())
    }
}
