//! The set of pipelines a service runs.

use super::Pipeline;
use crate::errors::{ConfigurationError, ErrorInfo};
use std::sync::Arc;

/// Id of the pipeline used by the HTTP trigger and for unrouted topics.
pub const DEFAULT_PIPELINE_ID: &str = "default-pipeline";

/// Pipelines keyed by id, in registration order.
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    pipelines: Vec<Arc<Pipeline>>,
}

impl PipelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a pipeline with the same id is registered.
    pub fn register(&mut self, pipeline: Pipeline) -> Result<Arc<Pipeline>, ConfigurationError> {
        if self.get(pipeline.id()).is_some() {
            return Err(ConfigurationError::new(format!(
                "pipeline with id '{}' already exists",
                pipeline.id()
            ))
            .with_subjects(vec![pipeline.id().to_string()])
            .with_error_info(
                ErrorInfo::new("CONFIG-005-DUPLICATE-PIPELINE", "Pipeline id is not unique")
                    .with_fix_hint("Give every per-topic pipeline a distinct id"),
            ));
        }
        let pipeline = Arc::new(pipeline);
        self.pipelines.push(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    /// Adds a pipeline, builder style.
    ///
    /// # Errors
    ///
    /// Returns an error if a pipeline with the same id is registered.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Result<Self, ConfigurationError> {
        self.register(pipeline)?;
        Ok(self)
    }

    /// Returns the pipeline with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.iter().find(|pipeline| pipeline.id() == id)
    }

    /// Returns the default pipeline, if registered.
    #[must_use]
    pub fn default_pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.get(DEFAULT_PIPELINE_ID)
    }

    /// Returns every pipeline whose topics match `topic`.
    #[must_use]
    pub fn matching(&self, topic: &str) -> Vec<Arc<Pipeline>> {
        self.pipelines
            .iter()
            .filter(|pipeline| pipeline.matches_topic(topic))
            .cloned()
            .collect()
    }

    /// Returns all pipelines.
    #[must_use]
    pub fn pipelines(&self) -> &[Arc<Pipeline>] {
        &self.pipelines
    }

    /// Returns the number of pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if no pipeline is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
