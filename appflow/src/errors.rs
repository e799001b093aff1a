//! Error types for the appflow runtime.
//!
//! The taxonomy mirrors how failures travel through a run: validation
//! failures never reach the executor, function failures abort a single run,
//! transport failures come from the message-bus collaborator, and
//! configuration failures are fatal at service start.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AppflowError>;

/// The main error type for appflow operations.
#[derive(Debug, Clone, Error)]
pub enum AppflowError {
    /// A malformed inbound payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// A pipeline function stopped the run with an error.
    #[error("{0}")]
    Function(#[from] FunctionError),

    /// A publish/subscribe failure reported by the message-bus collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid service or pipeline configuration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A run exceeded its processing deadline.
    #[error("pipeline '{pipeline_id}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The pipeline that was abandoned.
        pipeline_id: String,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
}

impl AppflowError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true for errors caused by a malformed inbound payload.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the run was abandoned on a deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns a short machine-readable kind label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Function(_) => "function",
            Self::Transport(_) => "transport",
            Self::Configuration(_) => "configuration",
            Self::Timeout { .. } => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for AppflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppflowError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppflowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Error returned by a function that stops a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("function '{function}' in pipeline '{pipeline_id}': {message}")]
pub struct FunctionError {
    /// The function that failed.
    pub function: String,
    /// The pipeline the function belongs to.
    pub pipeline_id: String,
    /// What went wrong.
    pub message: String,
}

impl FunctionError {
    /// Creates a new function error.
    #[must_use]
    pub fn new(
        function: impl Into<String>,
        pipeline_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            function: function.into(),
            pipeline_id: pipeline_id.into(),
            message: message.into(),
        }
    }
}

/// Diagnostic metadata attached to configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-001-EMPTY-PIPELINE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when configuration cannot produce a runnable service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// Pipelines or functions involved in the error.
    pub subjects: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            subjects: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the pipelines or functions involved.
    #[must_use]
    pub fn with_subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Error for a pipeline without functions.
    #[must_use]
    pub fn empty_pipeline(pipeline_id: &str) -> Self {
        Self::new(format!("pipeline '{pipeline_id}' has no functions"))
            .with_subjects(vec![pipeline_id.to_string()])
            .with_error_info(
                ErrorInfo::new("CONFIG-001-EMPTY-PIPELINE", "Pipeline has no functions")
                    .with_fix_hint("Set ExecutionOrder to at least one configured function"),
            )
    }

    /// Error for a function name missing from the built-in catalog.
    #[must_use]
    pub fn unknown_function(name: &str) -> Self {
        Self::new(format!("unknown function '{name}'"))
            .with_subjects(vec![name.to_string()])
            .with_error_info(
                ErrorInfo::new("CONFIG-002-UNKNOWN-FUNCTION", "Function is not in the catalog")
                    .with_context_entry("function", name),
            )
    }

    /// Error for an invalid or missing function parameter.
    #[must_use]
    pub fn invalid_parameter(function: &str, parameter: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(format!(
            "function '{function}': invalid parameter '{parameter}': {reason}"
        ))
        .with_subjects(vec![function.to_string()])
        .with_error_info(
            ErrorInfo::new("CONFIG-004-INVALID-PARAMETER", "Function parameter is invalid")
                .with_context_entry("parameter", parameter),
        )
    }

    /// Error for batch thresholds that cannot work together.
    #[must_use]
    pub fn batch_threshold(reason: impl Into<String>) -> Self {
        Self::new(format!("invalid batch configuration: {}", reason.into())).with_error_info(
            ErrorInfo::new("CONFIG-003-BATCH-THRESHOLD", "Batch thresholds conflict")
                .with_fix_hint("Set BatchThreshold, TimeInterval, or both depending on Mode"),
        )
    }
}
