//! Triggers adapt an external event source into pipeline runs.
//!
//! This module provides:
//! - The [`Trigger`] trait implemented by both variants
//! - [`HttpTrigger`] for request/response
//! - [`MessageBusTrigger`] for publish/subscribe, over a [`MessageClient`]

mod client;
mod http;
mod messagebus;

pub use client::{InMemoryMessageBus, MessageClient, MessageEnvelope, Subscription, SUBSCRIPTION_CAPACITY};
pub use http::{HttpTrigger, TRIGGER_ROUTE};
pub use messagebus::{MessageBusTrigger, DEFAULT_QUEUE_CAPACITY};

use crate::cancellation::ShutdownToken;
use crate::config::{AppConfig, TriggerType};
use crate::errors::{ConfigurationError, Result};
use crate::pipeline::PipelineRegistry;
use async_trait::async_trait;
use std::sync::Arc;

/// An inbound event source feeding pipelines.
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Returns the trigger variant name.
    fn name(&self) -> &'static str;

    /// Runs until `shutdown` fires, then waits for in-flight runs.
    async fn run(&self, shutdown: ShutdownToken) -> Result<()>;
}

/// Builds the trigger selected by the configuration.
///
/// A message-bus trigger needs `client`; the HTTP trigger ignores it.
pub fn build_trigger(
    config: &AppConfig,
    registry: Arc<PipelineRegistry>,
    client: Option<Arc<dyn MessageClient>>,
) -> std::result::Result<Box<dyn Trigger>, ConfigurationError> {
    match config.trigger.trigger_type {
        TriggerType::Http => {
            let pipeline = registry.default_pipeline().cloned();
            Ok(Box::new(HttpTrigger::from_config(config, pipeline)?))
        }
        TriggerType::MessageBus => {
            let client = client.ok_or_else(|| {
                ConfigurationError::new("the message-bus trigger requires a message client")
            })?;
            Ok(Box::new(MessageBusTrigger::from_config(config, client, registry)?))
        }
    }
}
