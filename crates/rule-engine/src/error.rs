//! Error types for the integration glue around the rule engine

use thiserror::Error;

/// Errors raised while moving events and actions between collaborators.
///
/// Rule evaluation itself is infallible: an event without a matching rule
/// yields no action rather than an error.
#[derive(Error, Debug)]
pub enum IntegrationError {
    /// The executor rejected the action or is no longer listening
    #[error("Action sink failed: {0}")]
    Sink(String),

    /// IO error while writing actions
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
