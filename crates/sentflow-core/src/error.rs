//! Error types for the execution engine.

use thiserror::Error;

/// Failure while resolving a `$`-path against the execution state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Variable '{root}' not found. Available: {available:?}")]
    UnknownRoot { root: String, available: Vec<String> },

    #[error("Key '{segment}' not found in {path}")]
    MissingKey { segment: String, path: String },

    #[error("Index {index} out of bounds in {path}")]
    IndexOutOfBounds { index: usize, path: String },

    #[error("Cannot access '{segment}' on {kind} in {path}")]
    CannotAccess {
        segment: String,
        kind: &'static str,
        path: String,
    },
}

/// Errors surfaced by handlers and task primitives.
///
/// The scheduler catches these per node: the node is marked errored and a
/// skip signal is propagated so downstream joins make progress.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("Cannot convert to number: {0}")]
    NotANumber(String),

    #[error("Unknown operation: {0}. Valid: add, sub, mul, divide")]
    UnknownOperation(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operator: {0}. Valid: <, >, ==, !=, >=, <=")]
    InvalidOperator(String),

    #[error("Cannot order {left} against {right}")]
    Incomparable { left: String, right: String },

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Request to {url} timed out after {attempts} attempts")]
    RequestTimedOut { url: String, attempts: u32 },

    #[error("Request to {url} failed after {attempts} attempts: {message}")]
    RequestFailed {
        url: String,
        attempts: u32,
        message: String,
    },
}
