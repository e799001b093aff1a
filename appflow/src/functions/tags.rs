//! Adds configured tags to events.

use super::{require_event, Function};
use crate::context::FunctionContext;
use crate::core::{FunctionOutput, Payload};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Returns a copy of the input event with the configured tags merged in.
///
/// Configured tags replace existing tags with the same key.
#[derive(Debug, Clone, Default)]
pub struct AddTagsFunction {
    tags: BTreeMap<String, String>,
}

impl AddTagsFunction {
    /// Creates the function for `tags`.
    #[must_use]
    pub const fn new(tags: BTreeMap<String, String>) -> Self {
        Self { tags }
    }

    /// Returns the configured tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

#[async_trait]
impl Function for AddTagsFunction {
    fn name(&self) -> &str {
        "AddTags"
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(pipeline_id = %ctx.pipeline_id(), count = self.tags.len(), "adding tags to event");

        let event = match require_event(ctx, &data) {
            Ok(event) => event,
            Err(err) => return FunctionOutput::fail(err),
        };
        if self.tags.is_empty() {
            return FunctionOutput::Proceed(data);
        }

        let mut tagged = event.clone();
        for (key, value) in &self.tags {
            tagged
                .tags
                .insert(key.clone(), serde_json::Value::String(value.clone()));
        }
        FunctionOutput::proceed(tagged)
    }
}
