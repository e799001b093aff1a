//! Per-run pipeline context.

use super::secrets::SecretProvider;
use super::state::{FunctionKey, FunctionStateStore, StateTypeError};
use super::values::ContextValues;
use crate::errors::Result;
use crate::events::{EventSink, NoOpEventSink};
use crate::utils::generate_id;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Span;

/// Header carrying the correlation id over HTTP.
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Content type used when a transport does not report one.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Content type of plain-text output such as base64.
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
/// Content type of XML output.
pub const CONTENT_TYPE_XML: &str = "application/xml";

/// The state carried by one pipeline run.
///
/// A context is created fresh for every inbound message and owned by that
/// run. Only the function-state store it points to is shared: it belongs to
/// the pipeline and outlives individual runs.
pub struct PipelineContext {
    /// Correlation id propagated from the transport.
    correlation_id: String,
    /// Content type of the inbound payload.
    input_content_type: String,
    /// Response data set by a function.
    response_data: RwLock<Option<Vec<u8>>>,
    /// Content type of the response data.
    response_content_type: RwLock<Option<String>>,
    /// Per-run values used for placeholder substitution.
    values: RwLock<ContextValues>,
    /// Pipeline-owned function state.
    state: Arc<FunctionStateStore>,
    /// Secrets available to functions.
    secrets: Option<Arc<dyn SecretProvider>>,
    /// Event sink for lifecycle events.
    event_sink: Arc<dyn EventSink>,
    /// Logging span of the run.
    span: Span,
}

impl PipelineContext {
    /// Creates a new context, generating a correlation id if none is given.
    #[must_use]
    pub fn new(correlation_id: Option<String>) -> Self {
        let correlation_id = correlation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_id);
        let span = tracing::info_span!("pipeline_run", correlation_id = %correlation_id);
        Self {
            correlation_id,
            input_content_type: CONTENT_TYPE_JSON.to_string(),
            response_data: RwLock::new(None),
            response_content_type: RwLock::new(None),
            values: RwLock::new(ContextValues::new()),
            state: Arc::new(FunctionStateStore::new()),
            secrets: None,
            event_sink: Arc::new(NoOpEventSink),
            span,
        }
    }

    /// Sets the input content type.
    #[must_use]
    pub fn with_input_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        if !content_type.is_empty() {
            self.input_content_type = content_type;
        }
        self
    }

    /// Points the context at a pipeline's function-state store.
    #[must_use]
    pub fn with_state_store(mut self, state: Arc<FunctionStateStore>) -> Self {
        self.state = state;
        self
    }

    /// Sets the secret provider.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Adds a context value.
    #[must_use]
    pub fn with_value(self, key: &str, value: impl Into<String>) -> Self {
        self.values.write().insert(key, value);
        self
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Returns the input content type.
    #[must_use]
    pub fn input_content_type(&self) -> &str {
        &self.input_content_type
    }

    /// Sets the response data. A later write replaces an earlier one.
    pub fn set_response_data(&self, data: impl Into<Vec<u8>>) {
        *self.response_data.write() = Some(data.into());
    }

    /// Returns the response data, if a function set it.
    #[must_use]
    pub fn response_data(&self) -> Option<Vec<u8>> {
        self.response_data.read().clone()
    }

    /// Sets the response content type. An empty string clears it.
    pub fn set_response_content_type(&self, content_type: impl Into<String>) {
        let content_type = content_type.into();
        *self.response_content_type.write() = if content_type.is_empty() {
            None
        } else {
            Some(content_type)
        };
    }

    /// Returns the response content type, if set.
    #[must_use]
    pub fn response_content_type(&self) -> Option<String> {
        self.response_content_type.read().clone()
    }

    /// Adds or replaces a context value.
    pub fn add_value(&self, key: &str, value: impl Into<String>) {
        self.values.write().insert(key, value);
    }

    /// Removes a context value.
    pub fn remove_value(&self, key: &str) {
        self.values.write().remove(key);
    }

    /// Returns a context value.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<String> {
        self.values.read().get(key).map(str::to_string)
    }

    /// Returns a copy of all context values.
    #[must_use]
    pub fn values(&self) -> HashMap<String, String> {
        self.values.read().to_map()
    }

    /// Replaces `{key}` placeholders in `template` with context values.
    pub fn apply_values(&self, template: &str) -> Result<String> {
        self.values.read().apply(template)
    }

    /// Returns a clone of the function state stored under `key`.
    #[must_use]
    pub fn get_function_state<T: Clone + 'static>(&self, key: &FunctionKey) -> Option<T> {
        self.state.get(key)
    }

    /// Replaces the function state stored under `key`.
    pub fn set_function_state<T: Send + 'static>(&self, key: &FunctionKey, value: T) {
        self.state.set(key, value);
    }

    /// Runs `f` on the function state under `key` inside its lock.
    pub fn with_function_state<T, R, F>(&self, key: &FunctionKey, f: F) -> std::result::Result<R, StateTypeError>
    where
        T: Default + Send + 'static,
        F: FnOnce(&mut T) -> R,
    {
        self.state.with_state(key, f)
    }

    /// Returns the secret provider, if configured.
    #[must_use]
    pub fn secrets(&self) -> Option<&Arc<dyn SecretProvider>> {
        self.secrets.as_ref()
    }

    /// Returns the logging span of this run.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Emits a lifecycle event enriched with the correlation id.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));
        if let Some(obj) = enriched.as_object_mut() {
            obj.insert(
                "correlation_id".to_string(),
                serde_json::Value::String(self.correlation_id.clone()),
            );
        }
        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("correlation_id", &self.correlation_id)
            .field("input_content_type", &self.input_content_type)
            .field("has_response_data", &self.response_data.read().is_some())
            .field("response_content_type", &*self.response_content_type.read())
            .finish_non_exhaustive()
    }
}
