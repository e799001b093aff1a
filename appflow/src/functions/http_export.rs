//! Exports pipeline data to an HTTP endpoint.

use super::{coerce_bytes, Function};
use crate::context::{FunctionContext, CONTENT_TYPE_JSON, CORRELATION_HEADER};
use crate::core::{FunctionOutput, Payload};
use crate::errors::{ConfigurationError, FunctionError};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

/// Default timeout of one export request.
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method used to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMethod {
    /// `POST`.
    Post,
    /// `PUT`.
    Put,
}

impl FromStr for ExportMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            other => Err(format!("'{other}' is not an export method (expected post or put)")),
        }
    }
}

impl fmt::Display for ExportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

#[derive(Debug, Clone)]
struct SecretHeader {
    header_name: String,
    secret_name: String,
    secret_value_key: String,
}

/// Sends the coerced input to a URL and proceeds with the response body.
///
/// The URL may contain `{key}` placeholders resolved from context values.
/// Each request carries the run's correlation id and is bounded by its
/// own timeout.
#[derive(Debug, Clone)]
pub struct HttpExportFunction {
    method: ExportMethod,
    url: String,
    mime_type: String,
    secret_header: Option<SecretHeader>,
    return_input_data: bool,
    continue_on_send_error: bool,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpExportFunction {
    /// Creates an exporter sending to `url` with `method`.
    pub fn new(method: ExportMethod, url: impl Into<String>) -> Result<Self, ConfigurationError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ConfigurationError::invalid_parameter(
                "HTTPExport",
                "url",
                "a destination URL is required",
            ));
        }
        let client = reqwest::Client::builder().build().map_err(|err| {
            ConfigurationError::invalid_parameter(
                "HTTPExport",
                "url",
                format!("failed to create HTTP client: {err}"),
            )
        })?;
        Ok(Self {
            method,
            url,
            mime_type: CONTENT_TYPE_JSON.to_string(),
            secret_header: None,
            return_input_data: false,
            continue_on_send_error: false,
            timeout: DEFAULT_EXPORT_TIMEOUT,
            client,
        })
    }

    /// Sets the `Content-Type` of the request. Empty keeps JSON.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        if !mime_type.is_empty() {
            self.mime_type = mime_type;
        }
        self
    }

    /// Sends a header whose value is read from the secret provider.
    #[must_use]
    pub fn with_secret_header(
        mut self,
        header_name: impl Into<String>,
        secret_name: impl Into<String>,
        secret_value_key: impl Into<String>,
    ) -> Self {
        self.secret_header = Some(SecretHeader {
            header_name: header_name.into(),
            secret_name: secret_name.into(),
            secret_value_key: secret_value_key.into(),
        });
        self
    }

    /// Proceeds with the input instead of the response body on success.
    #[must_use]
    pub const fn with_return_input_data(mut self, enabled: bool) -> Self {
        self.return_input_data = enabled;
        self
    }

    /// Proceeds with the input when the send fails.
    #[must_use]
    pub const fn with_continue_on_send_error(mut self, enabled: bool) -> Self {
        self.continue_on_send_error = enabled;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that the options can work together.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.continue_on_send_error && !self.return_input_data {
            return Err(ConfigurationError::invalid_parameter(
                "HTTPExport",
                "continueonsenderror",
                "can only be used together with returninputdata",
            ));
        }
        if let Some(header) = &self.secret_header {
            if header.header_name.is_empty()
                || header.secret_name.is_empty()
                || header.secret_value_key.is_empty()
            {
                return Err(ConfigurationError::invalid_parameter(
                    "HTTPExport",
                    "headername",
                    "headername, secretname and secretvaluekey must all be set",
                ));
            }
        }
        Ok(())
    }

    fn secret_header_value(&self, ctx: &FunctionContext) -> Result<Option<(String, String)>, FunctionError> {
        let Some(header) = &self.secret_header else {
            return Ok(None);
        };
        let provider = ctx
            .pipeline()
            .secrets()
            .ok_or_else(|| ctx.error("no secret provider configured"))?;
        let mut secrets = provider
            .get_secrets(&header.secret_name, &[header.secret_value_key.as_str()])
            .map_err(|err| ctx.error(err.to_string()))?;
        let value = secrets.remove(&header.secret_value_key).ok_or_else(|| {
            ctx.error(format!(
                "secret '{}' has no value for key '{}'",
                header.secret_name, header.secret_value_key
            ))
        })?;
        debug!(
            pipeline_id = %ctx.pipeline_id(),
            header = %header.header_name,
            secret_name = %header.secret_name,
            "setting HTTP header from secret store"
        );
        Ok(Some((header.header_name.clone(), value)))
    }

    async fn send(&self, ctx: &FunctionContext, body: Vec<u8>) -> Result<Vec<u8>, FunctionError> {
        let url = ctx
            .pipeline()
            .apply_values(&self.url)
            .map_err(|err| ctx.error(format!("failed to format URL '{}': {err}", self.url)))?;
        let secret_header = self.secret_header_value(ctx)?;

        let mut request = match self.method {
            ExportMethod::Post => self.client.post(&url),
            ExportMethod::Put => self.client.put(&url),
        }
        .timeout(self.timeout)
        .header(reqwest::header::CONTENT_TYPE, &self.mime_type)
        .header(CORRELATION_HEADER, ctx.correlation_id());
        if let Some((name, value)) = secret_header {
            request = request.header(name, value);
        }

        let size = body.len();
        let response = request
            .body(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| ctx.error(format!("failed to send data to {url}: {err}")))?;

        debug!(
            pipeline_id = %ctx.pipeline_id(),
            correlation_id = %ctx.correlation_id(),
            url = %url,
            bytes = size,
            status = %response.status(),
            "data exported"
        );

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|err| ctx.error(format!("failed to read response from {url}: {err}")))
    }
}

#[async_trait]
impl Function for HttpExportFunction {
    fn name(&self) -> &str {
        match self.method {
            ExportMethod::Post => "HTTPPost",
            ExportMethod::Put => "HTTPPut",
        }
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(pipeline_id = %ctx.pipeline_id(), method = %self.method, "HTTP exporting");

        let body = match coerce_bytes(ctx, &data) {
            Ok(body) => body,
            Err(err) => return FunctionOutput::fail(err),
        };

        match self.send(ctx, body).await {
            Ok(_) if self.return_input_data => FunctionOutput::Proceed(data),
            Ok(response) => FunctionOutput::proceed(response),
            Err(err) if self.continue_on_send_error => {
                error!(pipeline_id = %ctx.pipeline_id(), error = %err, "continuing pipeline on send error");
                FunctionOutput::Proceed(data)
            }
            Err(err) => FunctionOutput::fail(err),
        }
    }

    fn fingerprint(&self) -> String {
        format!(
            "HttpExportFunction {{ method: {}, url: {:?}, mime_type: {:?}, return_input_data: {}, continue_on_send_error: {} }}",
            self.method, self.url, self.mime_type, self.return_input_data, self.continue_on_send_error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InMemorySecretProvider, PipelineContext};
    use crate::functions::test_support::{function_ctx, function_ctx_with};
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::Router;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn echo(headers: HeaderMap, body: String) -> String {
        let correlation = headers
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let token = headers
            .get("X-Token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        format!("{correlation}|{token}|{body}")
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/echo/:device", post(echo).put(echo))
            .route("/fail", post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_post_proceeds_with_response_body() {
        let base = spawn_server().await;
        let pipeline = Arc::new(PipelineContext::new(Some("corr-1".into())).with_value("devicename", "d1"));
        let ctx = function_ctx_with(pipeline, "HTTPPost");
        let function = HttpExportFunction::new(ExportMethod::Post, format!("{base}/echo/{{devicename}}")).unwrap();

        let output = function.execute(&ctx, "hello".into()).await;
        assert_eq!(output, FunctionOutput::proceed(b"corr-1||hello".to_vec()));
    }

    #[tokio::test]
    async fn test_return_input_data() {
        let base = spawn_server().await;
        let function = HttpExportFunction::new(ExportMethod::Put, format!("{base}/echo/x"))
            .unwrap()
            .with_return_input_data(true);
        let output = function.execute(&function_ctx("HTTPPut"), "hello".into()).await;
        assert_eq!(output, FunctionOutput::proceed("hello"));
    }

    #[tokio::test]
    async fn test_secret_header() {
        let base = spawn_server().await;
        let secrets = InMemorySecretProvider::new();
        secrets.store("creds", HashMap::from([("token".to_string(), "s3cret".to_string())]));
        let pipeline = Arc::new(PipelineContext::new(Some("c".into())).with_secrets(Arc::new(secrets)));
        let function = HttpExportFunction::new(ExportMethod::Post, format!("{base}/echo/x"))
            .unwrap()
            .with_secret_header("X-Token", "creds", "token");

        let output = function.execute(&function_ctx_with(pipeline, "HTTPPost"), "b".into()).await;
        assert_eq!(output, FunctionOutput::proceed(b"c|s3cret|b".to_vec()));
    }

    #[tokio::test]
    async fn test_error_status_fails_run() {
        let base = spawn_server().await;
        let function = HttpExportFunction::new(ExportMethod::Post, format!("{base}/fail")).unwrap();
        let output = function.execute(&function_ctx("HTTPPost"), "x".into()).await;
        assert!(matches!(output, FunctionOutput::Fail(_)));
    }

    #[tokio::test]
    async fn test_continue_on_send_error_passes_input() {
        let base = spawn_server().await;
        let function = HttpExportFunction::new(ExportMethod::Post, format!("{base}/fail"))
            .unwrap()
            .with_return_input_data(true)
            .with_continue_on_send_error(true);
        assert!(function.validate().is_ok());
        let output = function.execute(&function_ctx("HTTPPost"), "x".into()).await;
        assert_eq!(output, FunctionOutput::proceed("x"));
    }

    #[tokio::test]
    async fn test_unknown_url_placeholder_fails() {
        let function = HttpExportFunction::new(ExportMethod::Post, "http://127.0.0.1:1/{missing}").unwrap();
        let output = function.execute(&function_ctx("HTTPPost"), "x".into()).await;
        let FunctionOutput::Fail(err) = output else {
            panic!("expected failure");
        };
        assert!(err.message.contains("failed to format URL"));
    }

    #[test]
    fn test_validate_option_combinations() {
        let function = HttpExportFunction::new(ExportMethod::Post, "http://localhost")
            .unwrap()
            .with_continue_on_send_error(true);
        assert!(function.validate().is_err());
        assert!(HttpExportFunction::new(ExportMethod::Post, " ").is_err());
    }
}
