//! The function contract and the built-in function catalog.
//!
//! A function is one step of a pipeline. It receives the run context and the
//! previous step's payload and returns a [`FunctionOutput`]: proceed with a
//! new payload, stop silently, or fail.

pub mod batch;
pub mod compression;
pub mod configurable;
pub mod conversion;
pub mod encryption;
pub mod filters;
#[cfg(feature = "http-export")]
pub mod http_export;
pub mod jsonlogic;
pub mod metrics;
pub mod response;
pub mod tags;
pub mod wrap;

pub use batch::{BatchFunction, BatchMode, BatchStore};
pub use compression::{CompressFunction, CompressionAlgorithm};
pub use configurable::{build_function, FunctionParameters};
pub use conversion::{TransformFunction, TransformType};
pub use encryption::{AesMode, AesProtection, EncryptionKey};
pub use filters::{FilterFunction, FilterProperty};
#[cfg(feature = "http-export")]
pub use http_export::{ExportMethod, HttpExportFunction};
pub use jsonlogic::{evaluate_rule, JsonLogicFunction};
pub use metrics::ToLineProtocolFunction;
pub use response::SetResponseDataFunction;
pub use tags::AddTagsFunction;
pub use wrap::WrapIntoEventFunction;

use crate::context::FunctionContext;
use crate::core::{Event, FunctionOutput, Payload};
use crate::errors::FunctionError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline functions.
///
/// Functions must treat their input as immutable and return a new value.
/// They may set response data on the run context and, if stateful, keep
/// state in their own slot via [`FunctionContext::with_state`].
#[async_trait]
pub trait Function: Send + Sync + Debug {
    /// Returns the name of the function.
    fn name(&self) -> &str;

    /// Executes the function on one payload.
    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput;

    /// Returns a string identifying this function and its configuration.
    ///
    /// Used to compute a pipeline's hash.
    fn fingerprint(&self) -> String {
        format!("{self:?}")
    }
}

/// A function backed by a closure.
pub struct FnFunction<F>
where
    F: Fn(&FunctionContext, Payload) -> FunctionOutput + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnFunction<F>
where
    F: Fn(&FunctionContext, Payload) -> FunctionOutput + Send + Sync,
{
    /// Creates a new closure-backed function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnFunction<F>
where
    F: Fn(&FunctionContext, Payload) -> FunctionOutput + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFunction").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Function for FnFunction<F>
where
    F: Fn(&FunctionContext, Payload) -> FunctionOutput + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        (self.func)(ctx, data)
    }
}

/// A function that passes its input through unchanged.
#[derive(Debug, Clone)]
pub struct PassThroughFunction {
    name: String,
}

impl PassThroughFunction {
    /// Creates a new pass-through function.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Function for PassThroughFunction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        FunctionOutput::Proceed(data)
    }
}

/// Returns the event in `data`, or an error naming what was received.
pub(crate) fn require_event<'a>(
    ctx: &FunctionContext,
    data: &'a Payload,
) -> Result<&'a Event, FunctionError> {
    data.as_event().ok_or_else(|| {
        ctx.error(format!("type received is not an Event (got {})", data.kind()))
    })
}

/// Coerces `data` into bytes, attributing failures to the function.
pub(crate) fn coerce_bytes(ctx: &FunctionContext, data: &Payload) -> Result<Vec<u8>, FunctionError> {
    data.to_bytes()
        .map_err(|err| ctx.error(format!("failed to encode input data: {err}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::{FunctionContext, FunctionKey, PipelineContext};
    use std::sync::Arc;

    /// Builds a function context over a fresh run context.
    pub fn function_ctx(name: &str) -> FunctionContext {
        function_ctx_with(Arc::new(PipelineContext::new(Some("test-corr".into()))), name)
    }

    /// Builds a function context over the given run context.
    pub fn function_ctx_with(ctx: Arc<PipelineContext>, name: &str) -> FunctionContext {
        FunctionContext::new(ctx, "test-pipeline", name, FunctionKey::new("test-pipeline", 0, name))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::function_ctx;
    use super::*;

    #[tokio::test]
    async fn test_fn_function() {
        let function = FnFunction::new("upper", |_ctx, data| match data {
            Payload::Text(text) => FunctionOutput::proceed(text.to_uppercase()),
            _ => FunctionOutput::stop(),
        });
        assert_eq!(function.name(), "upper");

        let ctx = function_ctx("upper");
        let output = function.execute(&ctx, Payload::from("abc")).await;
        assert_eq!(output, FunctionOutput::proceed("ABC"));
        assert_eq!(function.execute(&ctx, Payload::Bytes(vec![])).await, FunctionOutput::Stop);
    }

    #[tokio::test]
    async fn test_pass_through() {
        let function = PassThroughFunction::new("noop");
        let ctx = function_ctx("noop");
        let output = function.execute(&ctx, Payload::from("x")).await;
        assert_eq!(output, FunctionOutput::proceed("x"));
        assert!(function.fingerprint().contains("noop"));
    }

    #[test]
    fn test_require_event_rejects_other_payloads() {
        let ctx = function_ctx("Filter");
        let err = require_event(&ctx, &Payload::from("x")).unwrap_err();
        assert!(err.message.contains("not an Event"));
        assert_eq!(err.function, "Filter");
    }
}
