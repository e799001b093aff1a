//! Mock functions for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::FunctionContext;
use crate::core::{FunctionOutput, Payload};
use crate::functions::Function;

/// A mock function that returns a configurable output.
#[derive(Debug)]
pub struct MockFunction {
    name: String,
    output: Mutex<Option<FunctionOutput>>,
    call_count: AtomicUsize,
}

impl MockFunction {
    /// Creates a mock that passes its input through.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: Mutex::new(None),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Sets the output to return instead of passing the input through.
    pub fn set_output(&self, output: FunctionOutput) {
        *self.output.lock() = Some(output);
    }

    /// Returns the number of times the function was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Function for MockFunction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.output
            .lock()
            .clone()
            .unwrap_or(FunctionOutput::Proceed(data))
    }
}

/// A function that records every input and passes it through.
#[derive(Debug, Default)]
pub struct RecordingFunction {
    name: String,
    inputs: Mutex<Vec<Payload>>,
    correlation_ids: Mutex<Vec<String>>,
}

impl RecordingFunction {
    /// Creates a new recording function.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a shared recording function.
    #[must_use]
    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Returns all recorded inputs.
    #[must_use]
    pub fn inputs(&self) -> Vec<Payload> {
        self.inputs.lock().clone()
    }

    /// Returns the correlation id seen by each call.
    #[must_use]
    pub fn correlation_ids(&self) -> Vec<String> {
        self.correlation_ids.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Clears recorded calls.
    pub fn clear(&self) {
        self.inputs.lock().clear();
        self.correlation_ids.lock().clear();
    }
}

#[async_trait]
impl Function for RecordingFunction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        self.inputs.lock().push(data.clone());
        self.correlation_ids
            .lock()
            .push(ctx.correlation_id().to_string());
        FunctionOutput::Proceed(data)
    }
}

/// A function that always fails.
#[derive(Debug)]
pub struct FailingFunction {
    name: String,
    error: String,
}

impl FailingFunction {
    /// Creates a new failing function.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Function for FailingFunction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &FunctionContext, _data: Payload) -> FunctionOutput {
        FunctionOutput::fail(ctx.error(self.error.clone()))
    }
}

/// A function that always stops the run without an error.
#[derive(Debug)]
pub struct FilterOutFunction {
    name: String,
}

impl FilterOutFunction {
    /// Creates a new filtering function.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Function for FilterOutFunction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &FunctionContext, _data: Payload) -> FunctionOutput {
        FunctionOutput::Stop
    }
}

/// A function that sleeps before passing its input through.
#[derive(Debug)]
pub struct SlowFunction {
    name: String,
    delay: Duration,
}

impl SlowFunction {
    /// Creates a new slow function.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }

    /// Creates a slow function with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Function for SlowFunction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        tokio::time::sleep(self.delay).await;
        FunctionOutput::Proceed(data)
    }
}
