//! Request/response trigger.
//!
//! One endpoint accepts an event per request and answers with the outcome
//! of the default pipeline:
//!
//! | outcome                 | status | body                          |
//! |-------------------------|--------|-------------------------------|
//! | completed               | 200    | response data or final result |
//! | filtered out            | 200    | empty                         |
//! | undecodable payload     | 422    | error text                    |
//! | failed                  | 500    | error text                    |

use super::Trigger;
use crate::cancellation::ShutdownToken;
use crate::config::AppConfig;
use crate::context::{CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, CORRELATION_HEADER};
use crate::core::RunOutcome;
use crate::dispatcher::{Dispatched, Dispatcher, InboundMessage};
use crate::errors::{ConfigurationError, ErrorInfo, Result};
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Route of the trigger endpoint.
pub const TRIGGER_ROUTE: &str = "/api/v3/trigger";

#[derive(Clone)]
struct HttpState {
    pipeline: Arc<Pipeline>,
    dispatcher: Arc<Dispatcher>,
}

/// Trigger exposing the default pipeline over HTTP.
#[derive(Clone)]
pub struct HttpTrigger {
    state: HttpState,
    bind_address: String,
}

impl HttpTrigger {
    /// Creates a trigger serving `pipeline` on `bind_address`.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, dispatcher: Arc<Dispatcher>, bind_address: impl Into<String>) -> Self {
        Self {
            state: HttpState { pipeline, dispatcher },
            bind_address: bind_address.into(),
        }
    }

    /// Creates a trigger from the service configuration.
    ///
    /// The request timeout becomes the run deadline.
    pub fn from_config(
        config: &AppConfig,
        pipeline: Option<Arc<Pipeline>>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let pipeline = pipeline.ok_or_else(|| {
            ConfigurationError::new("the HTTP trigger requires a default pipeline").with_error_info(
                ErrorInfo::new("CONFIG-007-NO-DEFAULT-PIPELINE", "HTTP trigger has no pipeline to run")
                    .with_fix_hint("Set Writable.Pipeline.ExecutionOrder"),
            )
        })?;
        let dispatcher = Dispatcher::from_config(config)?.with_timeout(Some(config.service.request_timeout()?));
        Ok(Self::new(pipeline, Arc::new(dispatcher), config.service.bind_address()))
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.state.dispatcher
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(TRIGGER_ROUTE, post(handle_trigger))
            .with_state(self.state.clone())
    }

    /// Serves on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener, shutdown: ShutdownToken) -> Result<()> {
        info!(address = ?listener.local_addr().ok(), route = TRIGGER_ROUTE, "HTTP trigger listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        info!(stats = ?self.state.dispatcher.stats().snapshot(), "HTTP trigger stopped");
        Ok(())
    }
}

#[async_trait]
impl Trigger for HttpTrigger {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(&self, shutdown: ShutdownToken) -> Result<()> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        self.serve(listener, shutdown).await
    }
}

impl std::fmt::Debug for HttpTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTrigger")
            .field("pipeline", &self.state.pipeline.id())
            .field("bind_address", &self.bind_address)
            .finish_non_exhaustive()
    }
}

async fn handle_trigger(State(state): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    let correlation_id = header_str(&headers, CORRELATION_HEADER).map(str::to_string);
    let content_type = header_str(&headers, header::CONTENT_TYPE.as_str()).unwrap_or(CONTENT_TYPE_JSON);
    let message = InboundMessage::new(body.to_vec(), correlation_id).with_content_type(content_type);

    let dispatched = state.dispatcher.dispatch(&state.pipeline, &message).await;
    let mut response = respond(&dispatched);
    if let Ok(value) = HeaderValue::from_str(dispatched.context.correlation_id()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

fn respond(dispatched: &Dispatched) -> Response {
    match &dispatched.outcome {
        RunOutcome::FilteredOut => StatusCode::OK.into_response(),
        RunOutcome::Failed(err) => {
            let status = if err.is_validation() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            text_response(status, err.to_string())
        }
        RunOutcome::Completed(_) => match dispatched.response_body() {
            Ok(body) => {
                let mut response = Response::new(Body::from(body.unwrap_or_default()));
                if let Some(value) = dispatched
                    .content_type()
                    .and_then(|content_type| HeaderValue::from_str(&content_type).ok())
                {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                response
            }
            Err(err) => {
                error!(error = %err, "failed to encode pipeline result");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        },
    }
}

fn text_response(status: StatusCode, message: String) -> Response {
    (status, [(header::CONTENT_TYPE, CONTENT_TYPE_TEXT)], message).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FunctionOutput, Payload};
    use crate::functions::{FilterFunction, FnFunction, Function, SetResponseDataFunction, TransformFunction};
    use crate::pipeline::PipelineBuilder;
    use crate::testing::{sample_event_json, FailingFunction, RecordingFunction, SlowFunction};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tower::ServiceExt;

    fn trigger_for(functions: Vec<Arc<dyn Function>>) -> HttpTrigger {
        let pipeline = PipelineBuilder::new("default-pipeline").functions(functions).build().unwrap();
        HttpTrigger::new(Arc::new(pipeline), Arc::new(Dispatcher::new()), "127.0.0.1:0")
    }

    fn post_event(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(TRIGGER_ROUTE)
            .header(header::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(CORRELATION_HEADER, "corr-http")
            .body(body.into())
            .unwrap()
    }

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_completed_returns_terminal_result() {
        let filter: Arc<dyn Function> =
            Arc::new(FilterFunction::by_device_name(&["Random-Integer-Device"], false).unwrap());
        let shout: Arc<dyn Function> = Arc::new(FnFunction::new("shout", |_ctx, _data| {
            FunctionOutput::proceed("LAST")
        }));
        let trigger = trigger_for(vec![filter, shout]);

        let response = trigger
            .router()
            .oneshot(post_event(sample_event_json("Random-Integer-Device")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CORRELATION_HEADER], "corr-http");
        assert_eq!(body_of(response).await, b"LAST".to_vec());
    }

    #[tokio::test]
    async fn test_response_data_and_content_type() {
        let trigger = trigger_for(vec![
            Arc::new(TransformFunction::to_xml()),
            Arc::new(SetResponseDataFunction::new()),
            Arc::new(FnFunction::new("after", |_ctx, _data| FunctionOutput::proceed("ignored"))),
        ]);

        let response = trigger
            .router()
            .oneshot(post_event(sample_event_json("d")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
        let body = String::from_utf8(body_of(response).await).unwrap();
        assert!(body.contains("<DeviceName>d</DeviceName>"), "{body}");
    }

    #[tokio::test]
    async fn test_filtered_out_returns_empty_ok() {
        let trigger = trigger_for(vec![Arc::new(
            FilterFunction::by_device_name(&["Random-Integer-Device"], false).unwrap(),
        )]);

        let response = trigger
            .router()
            .oneshot(post_event(sample_event_json("Random-Float-Device")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_returns_500_with_error_text() {
        let trigger = trigger_for(vec![Arc::new(FailingFunction::new("explode", "kaboom"))]);

        let response = trigger
            .router()
            .oneshot(post_event(sample_event_json("d")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(body_of(response).await).unwrap();
        assert!(body.contains("kaboom"), "{body}");
    }

    #[tokio::test]
    async fn test_malformed_body_returns_422_without_running() {
        let recorder = RecordingFunction::shared("recorder");
        let trigger = trigger_for(vec![recorder.clone()]);

        let response = trigger.router().oneshot(post_event("{not an event")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(recorder.call_count(), 0);
        assert_eq!(trigger.dispatcher().stats().invalid(), 1);
    }

    #[tokio::test]
    async fn test_missing_correlation_header_is_generated() {
        let recorder = RecordingFunction::shared("recorder");
        let trigger = trigger_for(vec![recorder.clone()]);
        let request = Request::builder()
            .method("POST")
            .uri(TRIGGER_ROUTE)
            .body(Body::from(sample_event_json("d")))
            .unwrap();

        let response = trigger.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let generated = response.headers()[CORRELATION_HEADER].to_str().unwrap().to_string();
        assert!(!generated.is_empty());
        assert_eq!(recorder.correlation_ids(), vec![generated]);
        assert_eq!(
            recorder.inputs().first().and_then(|input| match input {
                Payload::Event(event) => Some(event.device_name.clone()),
                _ => None,
            }),
            Some("d".to_string())
        );
    }

    #[tokio::test]
    async fn test_request_timeout_returns_500() {
        let pipeline = PipelineBuilder::new("slow")
            .function(Arc::new(SlowFunction::with_delay_ms("sleep", 200)))
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new().with_timeout(Some(Duration::from_millis(20)));
        let trigger = HttpTrigger::new(Arc::new(pipeline), Arc::new(dispatcher), "127.0.0.1:0");

        let response = trigger.router().oneshot(post_event(sample_event_json("d"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(body_of(response).await).unwrap();
        assert_eq!(body, "pipeline 'slow' timed out after 20ms");
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let trigger = trigger_for(vec![RecordingFunction::shared("r")]);
        let request = Request::builder().uri(TRIGGER_ROUTE).body(Body::empty()).unwrap();
        let response = trigger.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let trigger = trigger_for(vec![RecordingFunction::shared("r")]);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = ShutdownToken::new();

        let server = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { trigger.serve(listener, shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.shutdown("test");

        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_from_config_requires_default_pipeline() {
        let config = AppConfig::from_yaml_str("Writable:\n  Pipeline:\n    ExecutionOrder: SetResponseData\n").unwrap();
        let err = HttpTrigger::from_config(&config, None).unwrap_err();
        assert!(err.message.contains("default pipeline"));

        let registry = config.build_registry().unwrap();
        let trigger = HttpTrigger::from_config(&config, registry.default_pipeline().cloned()).unwrap();
        assert_eq!(trigger.bind_address, "0.0.0.0:59700");
    }
}
