//! Result and error types for Pagar Mock.

use crate::inject::SimulatedApiError;
use thiserror::Error;

/// Result type for Pagar Mock operations
pub type PagarResult<T> = Result<T, PagarError>;

/// Errors that can occur in Pagar Mock
#[derive(Debug, Error)]
pub enum PagarError {
    /// Operation requires an active mock session
    #[error("Mock session not started: {message}")]
    UnstartedState {
        /// What was attempted without a session
        message: String,
    },

    /// Unknown test helper strategy requested
    #[error("Unknown test helper strategy: '{name}' (expected 'mock' or 'live')")]
    UnknownStrategy {
        /// The rejected strategy name
        name: String,
    },

    /// Mode transition not allowed from the current state
    #[error("Illegal mode transition: {message}")]
    IllegalTransition {
        /// Why the transition was rejected
        message: String,
    },

    /// Dispatch reached an operation with no registered handler
    ///
    /// Mirrors how an unrecognized route fails against the real service,
    /// so tests can assert on graceful degradation.
    #[error("No handler registered for {method} {path} (HTTP {status})")]
    SimulatedNotFound {
        /// Request method
        method: String,
        /// Request path
        path: String,
        /// Simulated HTTP status (always 404)
        status: u16,
    },

    /// Deliberate failure returned by a consumed error directive
    #[error("Injected failure: {error}")]
    InjectedFailure {
        /// The simulated error payload, shaped like the real service's
        error: SimulatedApiError,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PagarError {
    /// Create an `UnstartedState` error for the named operation
    #[must_use]
    pub fn unstarted(operation: &str) -> Self {
        Self::UnstartedState {
            message: format!("'{operation}' requires an active mock session (call start first)"),
        }
    }

    /// Create a `SimulatedNotFound` for an unmatched request
    #[must_use]
    pub fn not_found(method: &str, path: &str) -> Self {
        Self::SimulatedNotFound {
            method: method.to_string(),
            path: path.to_string(),
            status: 404,
        }
    }

    /// The simulated HTTP status carried by this error, if any
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::SimulatedNotFound { status, .. } => Some(*status),
            Self::InjectedFailure { error } => Some(error.http_status),
            _ => None,
        }
    }
}
