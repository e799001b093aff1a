//! Test fixtures for pipeline testing.

use std::sync::Arc;

use super::RecordingFunction;
use crate::context::PipelineContext;
use crate::core::{Event, Payload, RunOutcome};
use crate::errors::ConfigurationError;
use crate::functions::Function;
use crate::pipeline::{Pipeline, PipelineBuilder};

/// Profile name used by [`sample_event`].
pub const SAMPLE_PROFILE: &str = "Random-Integer-Device-Profile";
/// Resource name used by [`sample_event`].
pub const SAMPLE_RESOURCE: &str = "Int8";

/// Builds an event from `device_name` with one `Int8` reading.
#[must_use]
pub fn sample_event(device_name: &str) -> Event {
    let mut event = Event::new(SAMPLE_PROFILE, device_name, SAMPLE_RESOURCE);
    event.add_simple_reading(SAMPLE_RESOURCE, "Int8", "42");
    event
}

/// Returns [`sample_event`] encoded as JSON.
#[must_use]
pub fn sample_event_json(device_name: &str) -> Vec<u8> {
    serde_json::to_vec(&sample_event(device_name)).unwrap_or_default()
}

/// A test pipeline builder that keeps handles to recording functions.
pub struct TestPipeline {
    builder: PipelineBuilder,
    recorders: Vec<Arc<RecordingFunction>>,
}

impl TestPipeline {
    /// Creates a new test pipeline.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            builder: PipelineBuilder::new(id),
            recorders: Vec::new(),
        }
    }

    /// Sets the topics the pipeline handles.
    #[must_use]
    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.builder = self.builder.topics(topics);
        self
    }

    /// Appends a function.
    #[must_use]
    pub fn with_function(mut self, function: Arc<dyn Function>) -> Self {
        self.builder = self.builder.function(function);
        self
    }

    /// Appends a recording function and keeps its handle.
    #[must_use]
    pub fn with_recorder(mut self, name: impl Into<String>) -> Self {
        let recorder = RecordingFunction::shared(name);
        self.recorders.push(Arc::clone(&recorder));
        self.builder = self.builder.function(recorder);
        self
    }

    /// Creates a pipeline of `count` recording functions.
    #[must_use]
    pub fn linear(id: impl Into<String>, count: usize) -> Self {
        (0..count).fold(Self::new(id), |pipeline, i| pipeline.with_recorder(format!("function_{i}")))
    }

    /// Returns the recording functions in insertion order.
    #[must_use]
    pub fn recorders(&self) -> &[Arc<RecordingFunction>] {
        &self.recorders
    }

    /// Builds the pipeline and returns it with the recorder handles.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline is invalid.
    pub fn build(self) -> Result<(Pipeline, Vec<Arc<RecordingFunction>>), ConfigurationError> {
        Ok((self.builder.build()?, self.recorders))
    }
}

/// Runs `pipeline` once on `data` with a fresh context.
pub async fn run_pipeline(pipeline: &Pipeline, data: Payload) -> (RunOutcome, Arc<PipelineContext>) {
    let ctx = Arc::new(pipeline.context(None));
    let outcome = pipeline.execute(Arc::clone(&ctx), data).await;
    (outcome, ctx)
}
