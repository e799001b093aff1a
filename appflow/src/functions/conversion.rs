//! Event to JSON or XML conversion.

use super::{require_event, Function};
use crate::context::{FunctionContext, CONTENT_TYPE_JSON, CONTENT_TYPE_XML};
use crate::core::{FunctionOutput, Payload};
use async_trait::async_trait;
use std::str::FromStr;
use tracing::debug;

/// Target format of a [`TransformFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformType {
    /// JSON bytes.
    Json,
    /// XML text.
    Xml,
}

impl FromStr for TransformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(format!("'{other}' is not a transform type (expected json or xml)")),
        }
    }
}

/// Converts an event into JSON or XML and sets the matching content type.
#[derive(Debug, Clone)]
pub struct TransformFunction {
    target: TransformType,
}

impl TransformFunction {
    /// Creates a converter to `target`.
    #[must_use]
    pub const fn new(target: TransformType) -> Self {
        Self { target }
    }

    /// JSON converter.
    #[must_use]
    pub const fn to_json() -> Self {
        Self::new(TransformType::Json)
    }

    /// XML converter.
    #[must_use]
    pub const fn to_xml() -> Self {
        Self::new(TransformType::Xml)
    }
}

#[async_trait]
impl Function for TransformFunction {
    fn name(&self) -> &str {
        match self.target {
            TransformType::Json => "TransformToJSON",
            TransformType::Xml => "TransformToXML",
        }
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        let event = match require_event(ctx, &data) {
            Ok(event) => event,
            Err(err) => return FunctionOutput::fail(err),
        };
        debug!(pipeline_id = %ctx.pipeline_id(), target = ?self.target, "transforming event");

        match self.target {
            TransformType::Json => match serde_json::to_vec(event) {
                Ok(bytes) => {
                    ctx.pipeline().set_response_content_type(CONTENT_TYPE_JSON);
                    FunctionOutput::proceed(bytes)
                }
                Err(err) => FunctionOutput::fail(ctx.error(format!("unable to marshal Event to JSON: {err}"))),
            },
            TransformType::Xml => {
                ctx.pipeline().set_response_content_type(CONTENT_TYPE_XML);
                FunctionOutput::proceed(event.to_xml())
            }
        }
    }
}
