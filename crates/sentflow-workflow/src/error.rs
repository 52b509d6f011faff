//! Error types for the workflow model.

use thiserror::Error;

/// Structural problems detected before any node is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),
}
