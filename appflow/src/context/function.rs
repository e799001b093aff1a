//! The view of a run that one function receives.

use super::{FunctionKey, PipelineContext, StateTypeError};
use crate::errors::FunctionError;
use std::sync::Arc;

/// Context handed to a single function invocation.
///
/// Wraps the run's [`PipelineContext`] together with the identity of the
/// function being invoked, so stateful functions can reach their own slot.
#[derive(Debug, Clone)]
pub struct FunctionContext {
    /// The run context.
    pipeline_ctx: Arc<PipelineContext>,
    /// Id of the pipeline being executed.
    pipeline_id: String,
    /// Name of the function.
    function_name: String,
    /// Stable key of the function inside its pipeline.
    key: FunctionKey,
}

impl FunctionContext {
    /// Creates a new function context.
    #[must_use]
    pub fn new(
        pipeline_ctx: Arc<PipelineContext>,
        pipeline_id: impl Into<String>,
        function_name: impl Into<String>,
        key: FunctionKey,
    ) -> Self {
        Self {
            pipeline_ctx,
            pipeline_id: pipeline_id.into(),
            function_name: function_name.into(),
            key,
        }
    }

    /// Returns the run context.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineContext {
        &self.pipeline_ctx
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Returns the function name.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Returns the function's state key.
    #[must_use]
    pub const fn key(&self) -> &FunctionKey {
        &self.key
    }

    /// Returns the correlation id of the run.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        self.pipeline_ctx.correlation_id()
    }

    /// Builds an error attributed to this function and pipeline.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> FunctionError {
        FunctionError::new(&self.function_name, &self.pipeline_id, message)
    }

    /// Runs `f` on this function's own state inside its lock.
    pub fn with_state<T, R, F>(&self, f: F) -> Result<R, StateTypeError>
    where
        T: Default + Send + 'static,
        F: FnOnce(&mut T) -> R,
    {
        self.pipeline_ctx.with_function_state(&self.key, f)
    }
}
