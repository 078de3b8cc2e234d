//! Error types for optimist.
//!
//! Reconciliation itself never fails: unknown operation ids and stale keys are
//! no-ops, and a failed action is handed back to the caller untouched. The
//! errors here cover the edges of the API.

use std::time::Duration;

use thiserror::Error;

/// Error parsing an [`OperationId`](crate::operation::OperationId) from its string form.
#[derive(Debug, Error)]
pub enum OperationIdError {
    #[error("invalid operation id: {0}")]
    Decode(#[from] ulid::DecodeError),

    #[error("operation id is empty")]
    Empty,
}

/// Error validating a [`CoordinatorConfig`](crate::config::CoordinatorConfig).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A zero threshold would report every pending operation as stale
    #[error("stale_after must be greater than zero (got {0:?})")]
    ZeroStaleAfter(Duration),
}
