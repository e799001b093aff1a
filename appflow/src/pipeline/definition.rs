//! The configured pipeline.

use super::topics::topic_matches;
use crate::context::{FunctionKey, FunctionStateStore, PipelineContext, KEY_PIPELINE_ID};
use crate::functions::Function;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// An ordered, immutable sequence of functions plus a stable identifier.
///
/// Built by [`PipelineBuilder`](super::PipelineBuilder). The pipeline owns
/// the state store used by its stateful functions; that store is shared by
/// every run of the pipeline.
pub struct Pipeline {
    /// Stable identifier.
    id: String,
    /// Topics this pipeline handles on the message bus.
    topics: Vec<String>,
    /// Functions in execution order.
    functions: Vec<Arc<dyn Function>>,
    /// State key of each function, by position.
    keys: Vec<FunctionKey>,
    /// Pipeline-owned function state.
    state: Arc<FunctionStateStore>,
    /// Hash of the id and function configuration.
    hash: String,
}

impl Pipeline {
    pub(super) fn new(id: String, topics: Vec<String>, functions: Vec<Arc<dyn Function>>) -> Self {
        let keys = functions
            .iter()
            .enumerate()
            .map(|(position, function)| FunctionKey::new(&id, position, function.name()))
            .collect();
        let hash = compute_hash(&id, &functions);
        Self {
            id,
            topics,
            functions,
            keys,
            state: Arc::new(FunctionStateStore::new()),
            hash,
        }
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the topics this pipeline handles.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Returns the functions in execution order.
    #[must_use]
    pub fn functions(&self) -> &[Arc<dyn Function>] {
        &self.functions
    }

    /// Returns the function names in execution order.
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|function| function.name()).collect()
    }

    /// Returns the number of functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Always false; an empty pipeline cannot be built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Returns the function state store.
    #[must_use]
    pub fn state(&self) -> &Arc<FunctionStateStore> {
        &self.state
    }

    /// Returns a hex SHA-256 over the id and function fingerprints.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Pairs each function with its state key, in execution order.
    pub(super) fn steps(&self) -> impl Iterator<Item = (&Arc<dyn Function>, &FunctionKey)> {
        self.functions.iter().zip(&self.keys)
    }

    /// Returns true if any of the pipeline's topics matches `topic`.
    #[must_use]
    pub fn matches_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|filter| topic_matches(filter, topic))
    }

    /// Creates a fresh run context bound to this pipeline's state store.
    #[must_use]
    pub fn context(&self, correlation_id: Option<String>) -> PipelineContext {
        PipelineContext::new(correlation_id)
            .with_state_store(Arc::clone(&self.state))
            .with_value(KEY_PIPELINE_ID, self.id.clone())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("topics", &self.topics)
            .field("functions", &self.function_names())
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

fn compute_hash(id: &str, functions: &[Arc<dyn Function>]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    for function in functions {
        hasher.update(b"\n");
        hasher.update(function.fingerprint().as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{FilterFunction, PassThroughFunction};
    use pretty_assertions::assert_eq;

    fn functions() -> Vec<Arc<dyn Function>> {
        vec![
            Arc::new(PassThroughFunction::new("first")),
            Arc::new(PassThroughFunction::new("second")),
        ]
    }

    #[test]
    fn test_keys_are_positional() {
        let pipeline = Pipeline::new("p".into(), vec!["#".into()], functions());
        let steps: Vec<(&str, &str)> = pipeline
            .steps()
            .map(|(function, key)| (function.name(), key.as_str()))
            .collect();
        assert_eq!(steps, vec![("first", "p/0/first"), ("second", "p/1/second")]);
        assert_eq!(pipeline.function_names(), vec!["first", "second"]);
    }

    #[test]
    fn test_hash_tracks_configuration() {
        let a = Pipeline::new("p".into(), vec![], functions());
        let b = Pipeline::new("p".into(), vec![], functions());
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);

        let filter: Arc<dyn Function> = Arc::new(FilterFunction::by_device_name(&["d1"], false).unwrap());
        let c = Pipeline::new("p".into(), vec![], vec![filter]);
        assert_ne!(a.hash(), c.hash());
        let d = Pipeline::new("other".into(), vec![], functions());
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn test_context_is_bound_to_pipeline() {
        let pipeline = Pipeline::new("p".into(), vec![], functions());
        let ctx = pipeline.context(Some("corr".into()));
        assert_eq!(ctx.correlation_id(), "corr");
        assert_eq!(ctx.get_value(KEY_PIPELINE_ID).as_deref(), Some("p"));

        let key = FunctionKey::new("p", 0, "first");
        ctx.set_function_state(&key, 5u32);
        assert_eq!(pipeline.state().get::<u32>(&key), Some(5));
    }

    #[test]
    fn test_matches_topic() {
        let pipeline = Pipeline::new("p".into(), vec!["edgex/events/#".into()], functions());
        assert!(pipeline.matches_topic("edgex/events/device/a"));
        assert!(!pipeline.matches_topic("edgex/commands/a"));
    }
}
