//! Glue between a trigger's raw inbound message and a pipeline run.
//!
//! The dispatcher owns the concurrency policy: every run holds a permit of a
//! bounded semaphore, so when capacity is exhausted callers wait instead of
//! being dropped. It decodes the inbound bytes, builds a fresh
//! [`PipelineContext`] per run, applies the processing deadline, and keeps
//! [`DispatcherStats`].

mod stats;

pub use stats::{DispatcherStats, StatsSnapshot};

use crate::config::{AppConfig, TargetType};
use crate::context::{
    PipelineContext, SecretProvider, CONTENT_TYPE_JSON, KEY_DEVICE_NAME, KEY_PROFILE_NAME,
    KEY_RECEIVED_TOPIC, KEY_SOURCE_NAME,
};
use crate::core::{decode_event, Payload, RunOutcome};
use crate::errors::{AppflowError, ConfigurationError, Result};
use crate::events::EventSink;
use crate::pipeline::Pipeline;
use crate::utils::generate_id;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn, Instrument};

/// Default number of runs executing at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// One message received by a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Correlation id from the transport, or a generated one.
    pub correlation_id: String,
    /// Content type declared by the transport.
    pub content_type: String,
    /// Topic the message arrived on, for message-bus triggers.
    pub topic: Option<String>,
}

impl InboundMessage {
    /// Creates a JSON message, generating a correlation id if `correlation_id`
    /// is absent or blank.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>, correlation_id: Option<String>) -> Self {
        Self {
            payload: payload.into(),
            correlation_id: correlation_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(generate_id),
            content_type: CONTENT_TYPE_JSON.to_string(),
            topic: None,
        }
    }

    /// Sets the content type; blank keeps JSON.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        if !content_type.trim().is_empty() {
            self.content_type = content_type;
        }
        self
    }

    /// Sets the topic the message arrived on.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// The outcome of one dispatched run together with its context.
#[derive(Debug)]
pub struct Dispatched {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// The run's context, for response data and content type.
    pub context: Arc<PipelineContext>,
}

impl Dispatched {
    /// Returns the bytes to deliver for this run.
    ///
    /// Response data wins over the terminal result when set; filtered-out
    /// and failed runs deliver nothing.
    pub fn response_body(&self) -> Result<Option<Vec<u8>>> {
        if !self.outcome.is_completed() {
            return Ok(None);
        }
        if let Some(data) = self.context.response_data() {
            return Ok(Some(data));
        }
        self.outcome.result().map(Payload::to_bytes).transpose()
    }

    /// Returns the content type set by the pipeline, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.context.response_content_type()
    }
}

/// Runs decoded messages through pipelines under a concurrency limit.
pub struct Dispatcher {
    target_type: TargetType,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Option<Duration>,
    secrets: Option<Arc<dyn SecretProvider>>,
    event_sink: Option<Arc<dyn EventSink>>,
    stats: Arc<DispatcherStats>,
}

impl Dispatcher {
    /// Creates a dispatcher decoding events with the default concurrency
    /// limit and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            target_type: TargetType::Event,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: None,
            secrets: None,
            event_sink: None,
            stats: Arc::new(DispatcherStats::new()),
        }
    }

    /// Creates a dispatcher from the service configuration.
    ///
    /// The deadline is the processing timeout; HTTP triggers override it with
    /// the request timeout.
    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, ConfigurationError> {
        let mut dispatcher = Self::new()
            .with_target_type(config.writable.pipeline.target_type)
            .with_max_concurrency(config.dispatcher.max_concurrency)
            .with_secrets(Arc::new(config.secret_provider()));
        dispatcher.timeout = config.dispatcher.processing_timeout()?;
        Ok(dispatcher)
    }

    /// Sets what inbound payloads decode into.
    #[must_use]
    pub fn with_target_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }

    /// Sets how many runs may execute at once. Zero is treated as one.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        self.permits = Arc::new(Semaphore::new(max_concurrency));
        self.max_concurrency = max_concurrency;
        self
    }

    /// Sets the deadline of a single run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the secret provider handed to every run.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Sets the lifecycle event sink handed to every run.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<DispatcherStats> {
        &self.stats
    }

    /// Returns the concurrency limit.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Returns the number of runs that could start right now.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Decodes an inbound message according to the target type.
    ///
    /// Event targets require a JSON content type.
    pub fn decode(&self, message: &InboundMessage) -> Result<Payload> {
        match self.target_type {
            TargetType::Raw => Ok(Payload::Bytes(message.payload.clone())),
            TargetType::Event => {
                if !is_json(&message.content_type) {
                    return Err(AppflowError::validation(format!(
                        "content type '{}' cannot be decoded into an Event (expected {CONTENT_TYPE_JSON})",
                        message.content_type
                    )));
                }
                decode_event(&message.payload).map(Payload::Event)
            }
        }
    }

    /// Decodes `message` and runs it through `pipeline`.
    ///
    /// A decode failure never reaches the pipeline; it is returned as a
    /// failed outcome and counted as invalid.
    pub async fn dispatch(&self, pipeline: &Pipeline, message: &InboundMessage) -> Dispatched {
        match self.decode(message) {
            Ok(payload) => self.dispatch_decoded(pipeline, message, payload).await,
            Err(err) => {
                self.stats.record_invalid();
                warn!(
                    correlation_id = %message.correlation_id,
                    pipeline_id = %pipeline.id(),
                    error = %err,
                    "dropping undecodable message"
                );
                Dispatched {
                    outcome: RunOutcome::Failed(err),
                    context: Arc::new(self.context(pipeline, message, None)),
                }
            }
        }
    }

    /// Runs an already decoded payload through `pipeline`.
    ///
    /// Waits for a permit when the concurrency limit is reached.
    pub async fn dispatch_decoded(
        &self,
        pipeline: &Pipeline,
        message: &InboundMessage,
        payload: Payload,
    ) -> Dispatched {
        let context = Arc::new(self.context(pipeline, message, Some(&payload)));

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(err) => {
                let err = AppflowError::transport(format!("dispatcher is closed: {err}"));
                self.stats.record(crate::core::RunStatus::Failed);
                return Dispatched { outcome: RunOutcome::Failed(err), context };
            }
        };

        let run = pipeline.execute(Arc::clone(&context), payload);
        let outcome = match self.timeout {
            None => run.await,
            Some(timeout) => match tokio::time::timeout(timeout, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.stats.record_timeout();
                    RunOutcome::Failed(AppflowError::Timeout {
                        pipeline_id: pipeline.id().to_string(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                }
            },
        };
        self.stats.record(outcome.status());

        match &outcome {
            RunOutcome::Failed(err) => error!(
                parent: context.span(),
                pipeline_id = %pipeline.id(),
                kind = err.kind(),
                error = %err,
                "pipeline run failed"
            ),
            other => debug!(
                parent: context.span(),
                pipeline_id = %pipeline.id(),
                status = %other.status(),
                "pipeline run finished"
            ),
        }
        Dispatched { outcome, context }
    }

    /// Runs one message through every pipeline concurrently.
    ///
    /// Results are in the order of `pipelines`. An undecodable message runs
    /// nothing: every pipeline reports the same validation failure, and the
    /// message counts once as invalid.
    pub async fn dispatch_all(&self, pipelines: &[Arc<Pipeline>], message: &InboundMessage) -> Vec<Dispatched> {
        let payload = match self.decode(message) {
            Ok(payload) => payload,
            Err(err) => {
                self.stats.record_invalid();
                warn!(correlation_id = %message.correlation_id, error = %err, "dropping undecodable message");
                return pipelines
                    .iter()
                    .map(|pipeline| Dispatched {
                        outcome: RunOutcome::Failed(err.clone()),
                        context: Arc::new(self.context(pipeline, message, None)),
                    })
                    .collect();
            }
        };
        let runs = pipelines.iter().map(|pipeline| {
            let span = tracing::debug_span!("dispatch", pipeline_id = %pipeline.id());
            self.dispatch_decoded(pipeline, message, payload.clone())
                .instrument(span)
        });
        join_all(runs).await
    }

    fn context(&self, pipeline: &Pipeline, message: &InboundMessage, payload: Option<&Payload>) -> PipelineContext {
        let mut ctx = pipeline
            .context(Some(message.correlation_id.clone()))
            .with_input_content_type(message.content_type.clone());
        if let Some(secrets) = &self.secrets {
            ctx = ctx.with_secrets(Arc::clone(secrets));
        }
        if let Some(sink) = &self.event_sink {
            ctx = ctx.with_event_sink(Arc::clone(sink));
        }
        if let Some(topic) = &message.topic {
            ctx.add_value(KEY_RECEIVED_TOPIC, topic.clone());
        }
        if let Some(Payload::Event(event)) = payload {
            ctx.add_value(KEY_DEVICE_NAME, event.device_name.clone());
            ctx.add_value(KEY_PROFILE_NAME, event.profile_name.clone());
            ctx.add_value(KEY_SOURCE_NAME, event.source_name.clone());
        }
        ctx
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("target_type", &self.target_type)
            .field("max_concurrency", &self.max_concurrency)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(CONTENT_TYPE_JSON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{KEY_PIPELINE_ID, CONTENT_TYPE_TEXT};
    use crate::events::CollectingEventSink;
    use crate::functions::{Function, SetResponseDataFunction};
    use crate::pipeline::PipelineBuilder;
    use crate::testing::{
        assert_completed_with, assert_failed_with, sample_event, sample_event_json, RecordingFunction,
        SlowFunction, TestPipeline,
    };
    use crate::core::FunctionOutput;
    use crate::functions::FnFunction;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(device: &str) -> InboundMessage {
        InboundMessage::new(sample_event_json(device), Some("corr-1".to_string()))
    }

    #[test]
    fn test_inbound_message_defaults() {
        let message = InboundMessage::new(b"{}".to_vec(), None).with_content_type("");
        assert_eq!(message.content_type, CONTENT_TYPE_JSON);
        assert!(!message.correlation_id.is_empty());
        assert!(message.topic.is_none());
    }

    #[test]
    fn test_decode_event_and_raw() {
        let dispatcher = Dispatcher::new();
        let expected = sample_event("dev");
        let message = InboundMessage::new(serde_json::to_vec(&expected).unwrap(), None);
        assert_eq!(dispatcher.decode(&message).unwrap(), Payload::Event(expected));

        let raw = Dispatcher::new().with_target_type(TargetType::Raw);
        let bytes = raw.decode(&InboundMessage::new(b"not json".to_vec(), None)).unwrap();
        assert_eq!(bytes, Payload::Bytes(b"not json".to_vec()));
    }

    #[test]
    fn test_decode_rejects_non_json_content_type() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .decode(&message("dev").with_content_type(CONTENT_TYPE_TEXT))
            .unwrap_err();
        assert!(err.is_validation());

        let charset = message("dev").with_content_type("Application/JSON; charset=utf-8");
        assert!(dispatcher.decode(&charset).is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_sets_context_values() {
        let recorder = RecordingFunction::shared("recorder");
        let pipeline = PipelineBuilder::new("p").function(recorder.clone()).build().unwrap();
        let dispatcher = Dispatcher::new();

        let dispatched = dispatcher
            .dispatch(&pipeline, &message("Random-Integer-Device").with_topic("edgex/events/x"))
            .await;

        assert!(dispatched.outcome.is_completed());
        let ctx = &dispatched.context;
        assert_eq!(ctx.correlation_id(), "corr-1");
        assert_eq!(ctx.get_value(KEY_DEVICE_NAME).as_deref(), Some("Random-Integer-Device"));
        assert_eq!(ctx.get_value(KEY_RECEIVED_TOPIC).as_deref(), Some("edgex/events/x"));
        assert_eq!(ctx.get_value(KEY_PIPELINE_ID).as_deref(), Some("p"));
        assert_eq!(recorder.correlation_ids(), vec!["corr-1".to_string()]);
        assert_eq!(dispatcher.stats().completed(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_never_reaches_pipeline() {
        let (pipeline, recorders) = TestPipeline::linear("p", 2).build().unwrap();
        let dispatcher = Dispatcher::new();

        let dispatched = dispatcher
            .dispatch(&pipeline, &InboundMessage::new(b"{not json".to_vec(), None))
            .await;

        assert_failed_with(&dispatched.outcome, "failed to decode");
        assert_eq!(recorders[0].call_count(), 0);
        assert_eq!(dispatcher.stats().invalid(), 1);
        assert_eq!(dispatcher.stats().processed(), 0);
    }

    #[tokio::test]
    async fn test_response_data_wins_over_terminal_result() {
        let pipeline = PipelineBuilder::new("p")
            .function(Arc::new(FnFunction::new("shout", |_ctx, data| match data {
                Payload::Bytes(bytes) => FunctionOutput::proceed(format!("{}!", String::from_utf8_lossy(&bytes))),
                other => FunctionOutput::Proceed(other),
            })))
            .function(Arc::new(SetResponseDataFunction::new()))
            .function(Arc::new(FnFunction::new("replace", |_ctx, _data| {
                FunctionOutput::proceed("terminal")
            })))
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new().with_target_type(TargetType::Raw);

        let dispatched = dispatcher.dispatch(&pipeline, &InboundMessage::new(b"hi".to_vec(), None)).await;
        assert_completed_with(&dispatched.outcome, &Payload::from("terminal"));
        assert_eq!(dispatched.response_body().unwrap(), Some(b"hi!".to_vec()));
    }

    #[tokio::test]
    async fn test_terminal_result_without_response_data() {
        let (pipeline, _) = TestPipeline::linear("p", 1).build().unwrap();
        let dispatcher = Dispatcher::new().with_target_type(TargetType::Raw);
        let dispatched = dispatcher.dispatch(&pipeline, &InboundMessage::new(b"raw".to_vec(), None)).await;
        assert_eq!(dispatched.response_body().unwrap(), Some(b"raw".to_vec()));
        assert_eq!(dispatched.content_type(), None);
    }

    #[tokio::test]
    async fn test_timeout_reports_failed() {
        let pipeline = PipelineBuilder::new("slow")
            .function(Arc::new(SlowFunction::with_delay_ms("sleep", 200)))
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new()
            .with_target_type(TargetType::Raw)
            .with_timeout(Some(Duration::from_millis(20)));

        let dispatched = dispatcher.dispatch(&pipeline, &InboundMessage::new(b"x".to_vec(), None)).await;
        let err = dispatched.outcome.error().unwrap();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "pipeline 'slow' timed out after 20ms");
        assert_eq!(dispatcher.stats().timed_out(), 1);
        assert_eq!(dispatcher.stats().failed(), 1);
        assert_eq!(dispatched.response_body().unwrap(), None);
    }

    #[derive(Debug, Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[derive(Debug)]
    struct GaugedFunction(Arc<Gauge>);

    #[async_trait::async_trait]
    impl Function for GaugedFunction {
        fn name(&self) -> &str {
            "gauged"
        }

        async fn execute(&self, _ctx: &crate::context::FunctionContext, data: Payload) -> FunctionOutput {
            let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.current.fetch_sub(1, Ordering::SeqCst);
            FunctionOutput::Proceed(data)
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let gauge = Arc::new(Gauge::default());
        let pipeline = Arc::new(
            PipelineBuilder::new("bounded")
                .function(Arc::new(GaugedFunction(Arc::clone(&gauge))))
                .build()
                .unwrap(),
        );
        let dispatcher = Arc::new(Dispatcher::new().with_target_type(TargetType::Raw).with_max_concurrency(2));
        assert_eq!(dispatcher.max_concurrency(), 2);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    let message = InboundMessage::new(format!("{i}").into_bytes(), None);
                    dispatcher.dispatch(&pipeline, &message).await.outcome
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_completed());
        }

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.stats().completed(), 8);
        assert_eq!(dispatcher.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_all_runs_each_pipeline() {
        let sink = Arc::new(CollectingEventSink::new());
        let (first, first_recorders) = TestPipeline::linear("first", 1).build().unwrap();
        let (second, second_recorders) = TestPipeline::linear("second", 1).build().unwrap();
        let dispatcher = Dispatcher::new().with_event_sink(sink.clone());

        let results = dispatcher
            .dispatch_all(&[Arc::new(first), Arc::new(second)], &message("dev"))
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(first_recorders[0].call_count(), 1);
        assert_eq!(second_recorders[0].call_count(), 1);
        assert_eq!(sink.events_of_type("pipeline.completed").len(), 2);

        let none = dispatcher
            .dispatch_all(&[], &InboundMessage::new(b"garbage".to_vec(), None))
            .await;
        assert!(none.is_empty());
        assert_eq!(dispatcher.stats().invalid(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_all_reports_undecodable_message_per_pipeline() {
        let (first, first_recorders) = TestPipeline::linear("first", 1).build().unwrap();
        let (second, _) = TestPipeline::linear("second", 1).build().unwrap();
        let dispatcher = Dispatcher::new();

        let results = dispatcher
            .dispatch_all(
                &[Arc::new(first), Arc::new(second)],
                &InboundMessage::new(b"{oops".to_vec(), Some("c-9".into())),
            )
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.outcome.error().map(AppflowError::kind), Some("validation"));
            assert_eq!(result.context.correlation_id(), "c-9");
        }
        assert_eq!(first_recorders[0].call_count(), 0);
        assert_eq!(dispatcher.stats().invalid(), 1);
        assert_eq!(dispatcher.stats().processed(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig::from_yaml_str(
            "Dispatcher:\n  MaxConcurrency: 3\n  ProcessingTimeout: 250ms\nWritable:\n  Pipeline:\n    ExecutionOrder: SetResponseData\n    TargetType: raw\n",
        )
        .unwrap();
        let dispatcher = Dispatcher::from_config(&config).unwrap();
        assert_eq!(dispatcher.max_concurrency(), 3);
        assert_eq!(dispatcher.timeout, Some(Duration::from_millis(250)));
        assert_eq!(dispatcher.target_type, TargetType::Raw);
    }
}
