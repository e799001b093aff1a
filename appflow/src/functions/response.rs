//! Sets the run's response data from the pipeline data.

use super::{coerce_bytes, Function};
use crate::context::FunctionContext;
use crate::core::{FunctionOutput, Payload};
use async_trait::async_trait;
use tracing::debug;

/// Copies the coerced input into the response-data slot and passes the
/// input through.
///
/// Whatever a later function returns, the trigger answers with the
/// response data set here (unless a later function sets it again).
#[derive(Debug, Clone, Default)]
pub struct SetResponseDataFunction {
    response_content_type: Option<String>,
}

impl SetResponseDataFunction {
    /// Creates the function without a content type override.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            response_content_type: None,
        }
    }

    /// Sets the response content type written alongside the data.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.response_content_type = (!content_type.is_empty()).then_some(content_type);
        self
    }
}

#[async_trait]
impl Function for SetResponseDataFunction {
    fn name(&self) -> &str {
        "SetResponseData"
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(pipeline_id = %ctx.pipeline_id(), "setting response data");

        let bytes = match coerce_bytes(ctx, &data) {
            Ok(bytes) => bytes,
            Err(err) => return FunctionOutput::fail(err),
        };

        if let Some(content_type) = &self.response_content_type {
            ctx.pipeline().set_response_content_type(content_type.clone());
        }
        ctx.pipeline().set_response_data(bytes);
        FunctionOutput::Proceed(data)
    }
}
