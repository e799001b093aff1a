//! Pipeline builder with validation.

use super::topics::TOPIC_WILDCARD;
use super::Pipeline;
use crate::errors::ConfigurationError;
use crate::functions::{build_function, Function, FunctionParameters};
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for creating validated pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline id.
    id: String,
    /// Topics the pipeline handles.
    topics: Vec<String>,
    /// Functions in insertion order.
    functions: Vec<Arc<dyn Function>>,
}

impl PipelineBuilder {
    /// Creates a new builder. The pipeline handles every topic unless
    /// [`topics`](Self::topics) is called.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topics: vec![TOPIC_WILDCARD.to_string()],
            functions: Vec::new(),
        }
    }

    /// Sets the topics the pipeline handles.
    #[must_use]
    pub fn topics<S: AsRef<str>>(mut self, topics: &[S]) -> Self {
        self.topics = topics
            .iter()
            .map(|topic| topic.as_ref().trim().to_string())
            .filter(|topic| !topic.is_empty())
            .collect();
        self
    }

    /// Appends a function.
    #[must_use]
    pub fn function(mut self, function: Arc<dyn Function>) -> Self {
        self.functions.push(function);
        self
    }

    /// Appends every function in `functions`.
    #[must_use]
    pub fn functions(mut self, functions: impl IntoIterator<Item = Arc<dyn Function>>) -> Self {
        self.functions.extend(functions);
        self
    }

    /// Appends catalog functions named in `execution_order`.
    ///
    /// Each name is looked up case-insensitively in `parameters`; a name
    /// without an entry is built with no parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is not in the catalog or its parameters
    /// are invalid.
    pub fn catalog_functions<S: AsRef<str>>(
        mut self,
        execution_order: &[S],
        parameters: &HashMap<String, FunctionParameters>,
    ) -> Result<Self, ConfigurationError> {
        let by_name: HashMap<String, &FunctionParameters> = parameters
            .iter()
            .map(|(name, params)| (name.to_lowercase(), params))
            .collect();
        let empty = FunctionParameters::new();

        for name in execution_order {
            let name = name.as_ref().trim();
            let params = by_name.get(&name.to_lowercase()).copied().unwrap_or(&empty);
            let function = build_function(name, params).map_err(|err| {
                let mut subjects = vec![self.id.clone()];
                subjects.extend(err.subjects.iter().cloned());
                err.with_subjects(subjects)
            })?;
            self.functions.push(function);
        }
        Ok(self)
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the number of functions added so far.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline has no functions or no id.
    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        if self.id.trim().is_empty() {
            return Err(ConfigurationError::new("pipeline id must not be empty"));
        }
        if self.functions.is_empty() {
            return Err(ConfigurationError::empty_pipeline(&self.id));
        }
        Ok(Pipeline::new(self.id, self.topics, self.functions))
    }
}
