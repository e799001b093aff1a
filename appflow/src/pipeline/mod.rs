//! Pipeline building and execution.
//!
//! This module provides:
//! - The immutable [`Pipeline`] and its builder
//! - The sequential executor
//! - Topic matching and the pipeline registry

mod builder;
mod definition;
mod executor;
mod registry;
mod topics;

pub use builder::PipelineBuilder;
pub use definition::Pipeline;
pub use registry::{PipelineRegistry, DEFAULT_PIPELINE_ID};
pub use topics::{
    build_topic, topic_matches, TOPIC_LEVEL_SEPARATOR, TOPIC_SINGLE_LEVEL_WILDCARD, TOPIC_WILDCARD,
};
