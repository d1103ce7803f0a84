//! Custom error types for operator construction and script execution.
//!
//! Building a deferred handle never fails except for invalid calls (a
//! missing required argument). Everything else, including engine-side shape
//! or argument errors, surfaces only when a script is built or executed.
//!
//! Errors are serializable so they can be reported as `{code, message}`
//! pairs by the CLI's JSON output.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the operator library.
#[derive(Error, Debug)]
pub enum OperatorError {
    /// Execution was cancelled by the caller.
    #[error("Execution cancelled")]
    Cancelled,

    /// A required argument was not supplied to a builtin call.
    #[error("Invalid call to '{operation}': missing required argument '{argument}'")]
    MissingArgument {
        operation: String,
        argument: &'static str,
    },

    /// Nodes from different contexts were combined in one graph.
    #[error("Node {node} belongs to context {found}, expected context {expected}")]
    ContextMismatch { node: u64, expected: u64, found: u64 },

    /// The script result cannot be materialized by this executor.
    #[error("Cannot materialize output of type '{0}'")]
    UnsupportedOutput(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine command could not be started.
    #[error("Engine command not found: {}", .0.display())]
    EngineNotFound(PathBuf),

    /// The engine exited unsuccessfully.
    #[error("Engine failed (exit status {status:?}): {stderr}")]
    EngineFailed { status: Option<i32>, stderr: String },

    /// The engine finished but did not write the expected output.
    #[error("Engine produced no output at {}", .0.display())]
    OutputMissing(PathBuf),

    /// Internal error (e.g., unexpected executor state).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<OperatorError>,
    },
}

impl OperatorError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        OperatorError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::MissingArgument { .. } => "MISSING_ARGUMENT",
            Self::ContextMismatch { .. } => "CONTEXT_MISMATCH",
            Self::UnsupportedOutput(_) => "UNSUPPORTED_OUTPUT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::EngineNotFound(_) => "ENGINE_NOT_FOUND",
            Self::EngineFailed { .. } => "ENGINE_FAILED",
            Self::OutputMissing(_) => "OUTPUT_MISSING",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if the failure was reported by the engine rather than by this library.
    pub fn is_engine_failure(&self) -> bool {
        match self {
            Self::EngineFailed { .. } | Self::OutputMissing(_) => true,
            Self::WithContext { source, .. } => source.is_engine_failure(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for OperatorError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("OperatorError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for operator operations.
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| OperatorError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| OperatorError::Io(e).with_context(context))
    }
}
