//! Wraps arbitrary pipeline data into a new event.

use super::{coerce_bytes, Function};
use crate::context::{FunctionContext, KEY_DEVICE_NAME, KEY_PROFILE_NAME, KEY_SOURCE_NAME};
use crate::core::{
    normalize_value_type, AddEventRequest, Event, FunctionOutput, Payload, VALUE_TYPE_BINARY,
    VALUE_TYPE_OBJECT,
};
use crate::errors::{ConfigurationError, FunctionError};
use async_trait::async_trait;
use tracing::debug;

/// Builds an event with one reading holding the input and returns it as an
/// [`AddEventRequest`].
///
/// Binary readings carry the coerced bytes, object readings the JSON form
/// of the input, and every other value type the input rendered as text.
/// The response content type is cleared so the request is published as is.
#[derive(Debug, Clone)]
pub struct WrapIntoEventFunction {
    profile_name: String,
    device_name: String,
    resource_name: String,
    value_type: &'static str,
    media_type: String,
}

impl WrapIntoEventFunction {
    /// Creates a wrapper for `value_type` readings.
    pub fn new(
        profile_name: impl Into<String>,
        device_name: impl Into<String>,
        resource_name: impl Into<String>,
        value_type: &str,
    ) -> Result<Self, ConfigurationError> {
        let value_type = normalize_value_type(value_type).map_err(|err| {
            ConfigurationError::invalid_parameter("WrapIntoEvent", "valuetype", err.to_string())
        })?;
        Ok(Self {
            profile_name: profile_name.into(),
            device_name: device_name.into(),
            resource_name: resource_name.into(),
            value_type,
            media_type: String::new(),
        })
    }

    /// Sets the media type of binary readings.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Returns the canonical value type of the wrapped reading.
    #[must_use]
    pub const fn value_type(&self) -> &'static str {
        self.value_type
    }

    fn build_event(&self, ctx: &FunctionContext, data: &Payload) -> Result<Event, FunctionError> {
        let mut event = Event::new(&self.profile_name, &self.device_name, &self.resource_name);
        match self.value_type {
            VALUE_TYPE_BINARY => {
                let bytes = coerce_bytes(ctx, data)?;
                event.add_binary_reading(&self.resource_name, bytes, &self.media_type);
            }
            VALUE_TYPE_OBJECT => {
                let value = data
                    .to_json()
                    .map_err(|err| ctx.error(format!("object reading requires JSON data: {err}")))?;
                event.add_object_reading(&self.resource_name, value);
            }
            value_type => {
                let text = match data {
                    Payload::Text(text) => text.clone(),
                    other => String::from_utf8_lossy(&coerce_bytes(ctx, other)?).into_owned(),
                };
                event.add_simple_reading(&self.resource_name, value_type, text);
            }
        }
        Ok(event)
    }
}

#[async_trait]
impl Function for WrapIntoEventFunction {
    fn name(&self) -> &str {
        "WrapIntoEvent"
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(
            pipeline_id = %ctx.pipeline_id(),
            value_type = self.value_type,
            "wrapping data into event"
        );

        let event = match self.build_event(ctx, &data) {
            Ok(event) => event,
            Err(err) => return FunctionOutput::fail(err),
        };

        let pipeline = ctx.pipeline();
        pipeline.set_response_content_type("");
        pipeline.add_value(KEY_PROFILE_NAME, &self.profile_name);
        pipeline.add_value(KEY_DEVICE_NAME, &self.device_name);
        pipeline.add_value(KEY_SOURCE_NAME, &self.resource_name);

        FunctionOutput::proceed(AddEventRequest::new(event))
    }
}
