//! Publish/subscribe trigger.
//!
//! Delivered messages are queued into a bounded channel and consumed by a
//! fixed pool of workers. Each message runs through every pipeline whose
//! topics match the received topic; completed runs are published to the
//! configured topic when one is set.

use super::client::{MessageClient, MessageEnvelope, Subscription};
use super::Trigger;
use crate::cancellation::{InFlightRuns, ShutdownToken};
use crate::config::AppConfig;
use crate::context::CONTENT_TYPE_JSON;
use crate::core::RunOutcome;
use crate::dispatcher::{Dispatched, Dispatcher, InboundMessage};
use crate::errors::{ConfigurationError, Result};
use crate::pipeline::PipelineRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn, Instrument};

/// Default capacity of the work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Trigger fed by a message-bus subscription.
pub struct MessageBusTrigger {
    inner: Arc<Inner>,
    subscribe_topics: Vec<String>,
    queue_capacity: usize,
}

#[derive(Clone)]
struct Inner {
    client: Arc<dyn MessageClient>,
    registry: Arc<PipelineRegistry>,
    dispatcher: Arc<Dispatcher>,
    publish_topic: Option<String>,
}

impl MessageBusTrigger {
    /// Creates a trigger subscribing to `subscribe_topics`.
    #[must_use]
    pub fn new(
        client: Arc<dyn MessageClient>,
        registry: Arc<PipelineRegistry>,
        dispatcher: Arc<Dispatcher>,
        subscribe_topics: Vec<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                registry,
                dispatcher,
                publish_topic: None,
            }),
            subscribe_topics,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Creates a trigger from the service configuration.
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn MessageClient>,
        registry: Arc<PipelineRegistry>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let topics = config.subscribe_topics();
        if topics.is_empty() {
            return Err(ConfigurationError::new(
                "SubscribeTopics cannot be empty for a message-bus trigger",
            ));
        }
        let dispatcher = Arc::new(Dispatcher::from_config(config)?);
        Ok(Self::new(client, registry, dispatcher, topics)
            .with_publish_topic(config.publish_topic())
            .with_queue_capacity(config.dispatcher.queue_capacity))
    }

    /// Sets the outbound topic; it may contain `{placeholders}`.
    #[must_use]
    pub fn with_publish_topic(mut self, topic: Option<String>) -> Self {
        Arc::make_mut(&mut self.inner).publish_topic = topic.filter(|t| !t.trim().is_empty());
        self
    }

    /// Sets how many messages may wait for a worker. Zero is treated as one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Returns the subscribed topic filters.
    #[must_use]
    pub fn subscribe_topics(&self) -> &[String] {
        &self.subscribe_topics
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner.dispatcher
    }

    /// Runs one delivered message through every matching pipeline and
    /// publishes the completed results.
    ///
    /// A publish failure turns that run's outcome into a transport failure.
    pub async fn handle(&self, envelope: MessageEnvelope) -> Vec<RunOutcome> {
        self.inner.handle(envelope).await
    }
}

impl Inner {
    async fn handle(&self, envelope: MessageEnvelope) -> Vec<RunOutcome> {
        let pipelines = self.registry.matching(&envelope.topic);
        if pipelines.is_empty() {
            debug!(topic = %envelope.topic, "no pipeline matches topic");
            return Vec::new();
        }

        let message = InboundMessage::new(envelope.payload, Some(envelope.correlation_id))
            .with_content_type(envelope.content_type)
            .with_topic(envelope.topic);

        let mut outcomes = Vec::with_capacity(pipelines.len());
        for dispatched in self.dispatcher.dispatch_all(&pipelines, &message).await {
            let outcome = match self.publish(&dispatched).await {
                Ok(()) => dispatched.outcome,
                Err(err) => {
                    error!(
                        correlation_id = %dispatched.context.correlation_id(),
                        error = %err,
                        "failed to publish pipeline result"
                    );
                    RunOutcome::Failed(err)
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn publish(&self, dispatched: &Dispatched) -> Result<()> {
        let Some(template) = &self.publish_topic else {
            return Ok(());
        };
        let Some(body) = dispatched.response_body()? else {
            return Ok(());
        };
        let ctx = &dispatched.context;
        let topic = ctx.apply_values(template)?;
        let content_type = dispatched
            .content_type()
            .unwrap_or_else(|| CONTENT_TYPE_JSON.to_string());

        debug!(topic = %topic, correlation_id = %ctx.correlation_id(), bytes = body.len(), "publishing result");
        self.client
            .publish(MessageEnvelope::new(topic, body, ctx.correlation_id()).with_content_type(content_type))
            .await
    }
}

#[async_trait]
impl Trigger for MessageBusTrigger {
    fn name(&self) -> &'static str {
        "messagebus"
    }

    async fn run(&self, shutdown: ShutdownToken) -> Result<()> {
        let Subscription { mut messages, mut errors } =
            self.inner.client.subscribe(&self.subscribe_topics).await?;
        info!(topics = ?self.subscribe_topics, "message-bus trigger subscribed");

        let (queue_tx, queue_rx) = mpsc::channel::<MessageEnvelope>(self.queue_capacity);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let workers = InFlightRuns::new();
        for worker in 0..self.inner.dispatcher.max_concurrency() {
            let inner = Arc::clone(&self.inner);
            let queue_rx = Arc::clone(&queue_rx);
            workers.spawn(
                async move {
                    loop {
                        let next = queue_rx.lock().await.recv().await;
                        let Some(envelope) = next else { break };
                        inner.handle(envelope).await;
                    }
                }
                .instrument(tracing::debug_span!("messagebus_worker", worker)),
            );
        }

        let mut errors_open = true;
        loop {
            tokio::select! {
                biased;
                () = shutdown.wait() => break,
                received = messages.recv() => {
                    let Some(envelope) = received else {
                        warn!("subscription closed by the message-bus client");
                        break;
                    };
                    tokio::select! {
                        biased;
                        () = shutdown.wait() => break,
                        sent = queue_tx.send(envelope) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                reported = errors.recv(), if errors_open => match reported {
                    Some(err) => {
                        self.inner.dispatcher.stats().record_invalid();
                        warn!(error = %err, "message-bus client reported an error");
                    }
                    None => errors_open = false,
                },
            }
        }

        drop(queue_tx);
        workers.drain().await;
        info!(stats = ?self.inner.dispatcher.stats().snapshot(), "message-bus trigger stopped");
        Ok(())
    }
}

impl std::fmt::Debug for MessageBusTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBusTrigger")
            .field("subscribe_topics", &self.subscribe_topics)
            .field("publish_topic", &self.inner.publish_topic)
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}
