//! Error types for the FlowQuery engine.

use thiserror::Error;

/// The single error type returned by every fallible FlowQuery operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("arity error: {function} expects {expected}, got {got}")]
    ArityError {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("aggregate nesting error: aggregate function '{function}' cannot appear inside another aggregate")]
    AggregateNestingError { function: String },

    #[error("shape error: {0}")]
    ShapeError(String),

    #[error("semantic error: {0}")]
    SemanticError(String),

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("provider '{source}' failed: {cause}")]
    ProviderError { source: String, cause: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
