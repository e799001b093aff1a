//! Context management for pipeline execution.
//!
//! This module provides:
//! - The per-run [`PipelineContext`]
//! - The per-function [`FunctionContext`] view
//! - Pipeline-owned storage for stateful functions
//! - Context values and secrets

#[cfg(test)]
mod context_tests;
mod execution;
mod function;
mod secrets;
mod state;
mod values;

pub use execution::{
    PipelineContext, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, CONTENT_TYPE_XML, CORRELATION_HEADER,
};
pub use function::FunctionContext;
pub use secrets::{InMemorySecretProvider, SecretProvider};
pub use state::{FunctionKey, FunctionStateStore, StateTypeError};
pub use values::{
    ContextValues, KEY_DEVICE_NAME, KEY_PIPELINE_ID, KEY_PROFILE_NAME, KEY_RECEIVED_TOPIC,
    KEY_SOURCE_NAME,
};
