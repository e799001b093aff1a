//! The message-bus collaborator contract and an in-memory implementation.

use crate::context::CONTENT_TYPE_JSON;
use crate::errors::{AppflowError, Result};
use crate::pipeline::topic_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Capacity of each subscription channel of [`InMemoryMessageBus`].
pub const SUBSCRIPTION_CAPACITY: usize = 256;

/// A message as carried by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Topic the message was published on.
    pub topic: String,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// Correlation id linking the message to its response.
    pub correlation_id: String,
    /// MIME type of the payload.
    pub content_type: String,
}

impl MessageEnvelope {
    /// Creates a JSON envelope.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, correlation_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            correlation_id: correlation_id.into(),
            content_type: CONTENT_TYPE_JSON.to_string(),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// A live subscription: delivered messages plus errors the client reports.
#[derive(Debug)]
pub struct Subscription {
    /// Delivered messages.
    pub messages: mpsc::Receiver<MessageEnvelope>,
    /// Errors raised while receiving.
    pub errors: mpsc::Receiver<AppflowError>,
}

/// The capabilities the message-bus trigger needs from a broker client.
///
/// Transport, QoS, and redelivery belong to the implementation.
#[async_trait]
pub trait MessageClient: Send + Sync {
    /// Subscribes to every topic filter in `topics`.
    async fn subscribe(&self, topics: &[String]) -> Result<Subscription>;

    /// Publishes `envelope` to `envelope.topic`.
    async fn publish(&self, envelope: MessageEnvelope) -> Result<()>;
}

struct Subscriber {
    filters: Vec<String>,
    messages: mpsc::Sender<MessageEnvelope>,
    errors: mpsc::Sender<AppflowError>,
}

/// A broker living in process memory.
///
/// Publishing delivers to every subscriber whose filters match and records
/// the envelope so tests can inspect it.
#[derive(Default)]
pub struct InMemoryMessageBus {
    subscribers: Mutex<Vec<Subscriber>>,
    published: Mutex<Vec<MessageEnvelope>>,
    fail_publish: AtomicBool,
}

impl InMemoryMessageBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every published envelope in order.
    #[must_use]
    pub fn published(&self) -> Vec<MessageEnvelope> {
        self.published.lock().clone()
    }

    /// Returns the envelopes published on `topic`.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<MessageEnvelope> {
        self.published
            .lock()
            .iter()
            .filter(|envelope| envelope.topic == topic)
            .cloned()
            .collect()
    }

    /// Makes subsequent publishes fail with a transport error.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Reports `error` on every subscription's error channel.
    pub async fn report_error(&self, error: AppflowError) {
        let senders: Vec<_> = self.subscribers.lock().iter().map(|s| s.errors.clone()).collect();
        for sender in senders {
            // A closed receiver means the subscription went away.
            let _ = sender.send(error.clone()).await;
        }
    }

    async fn deliver(&self, envelope: &MessageEnvelope) {
        let targets: Vec<_> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|s| !s.messages.is_closed());
            subscribers
                .iter()
                .filter(|s| s.filters.iter().any(|filter| topic_matches(filter, &envelope.topic)))
                .map(|s| s.messages.clone())
                .collect()
        };
        for sender in targets {
            if sender.send(envelope.clone()).await.is_err() {
                debug!(topic = %envelope.topic, "subscriber dropped before delivery");
            }
        }
    }
}

#[async_trait]
impl MessageClient for InMemoryMessageBus {
    async fn subscribe(&self, topics: &[String]) -> Result<Subscription> {
        if topics.is_empty() {
            return Err(AppflowError::transport("no topics to subscribe to"));
        }
        let (message_tx, message_rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        self.subscribers.lock().push(Subscriber {
            filters: topics.to_vec(),
            messages: message_tx,
            errors: error_tx,
        });
        debug!(topics = ?topics, "subscribed");
        Ok(Subscription {
            messages: message_rx,
            errors: error_rx,
        })
    }

    async fn publish(&self, envelope: MessageEnvelope) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(AppflowError::transport(format!(
                "failed to publish to '{}': broker unavailable",
                envelope.topic
            )));
        }
        self.published.lock().push(envelope.clone());
        self.deliver(&envelope).await;
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMessageBus")
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published.lock().len())
            .finish_non_exhaustive()
    }
}
