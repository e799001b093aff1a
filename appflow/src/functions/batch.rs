//! Batching by count, by time window, or by whichever comes first.
//!
//! The buffer lives in the pipeline's function-state store, so it survives
//! across runs and is shared by concurrent runs of the same pipeline. Every
//! append, flush, and reset happens inside the slot lock.
//!
//! The time window is checked when a new item arrives. If it has elapsed,
//! the run proceeds with the buffer as it was *before* the new item, and the
//! new item seeds the next window.

use super::{coerce_bytes, Function};
use crate::context::FunctionContext;
use crate::core::{decode_event, FunctionOutput, Payload};
use crate::errors::ConfigurationError;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

/// How a batch decides to flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Flush when the buffer holds the threshold count.
    ByCount,
    /// Flush when the window has elapsed.
    ByTime,
    /// Flush on whichever threshold is reached first.
    ByTimeCount,
}

impl FromStr for BatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bycount" => Ok(Self::ByCount),
            "bytime" => Ok(Self::ByTime),
            "bytimecount" => Ok(Self::ByTimeCount),
            other => Err(format!(
                "'{other}' is not a batch mode (expected bycount, bytime, or bytimecount)"
            )),
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByCount => write!(f, "bycount"),
            Self::ByTime => write!(f, "bytime"),
            Self::ByTimeCount => write!(f, "bytimecount"),
        }
    }
}

/// Buffered items of one batch function instance.
#[derive(Debug, Default)]
pub struct BatchStore {
    /// Items in arrival order.
    pub items: Vec<Vec<u8>>,
    /// Start of the current window, set by the first buffered item.
    pub window_start: Option<Instant>,
}

impl BatchStore {
    fn take(&mut self) -> Vec<Vec<u8>> {
        self.window_start = None;
        std::mem::take(&mut self.items)
    }
}

/// Accumulates payloads and emits them as one batch.
///
/// Runs that only buffer stop silently. The run whose arrival meets a
/// threshold is the one that carries the flushed batch downstream.
#[derive(Debug, Clone)]
pub struct BatchFunction {
    mode: BatchMode,
    threshold: Option<usize>,
    interval: Option<Duration>,
    is_event_data: bool,
    merge_on_send: bool,
}

impl BatchFunction {
    /// Batch that flushes every `threshold` items.
    pub fn by_count(threshold: usize) -> Result<Self, ConfigurationError> {
        if threshold == 0 {
            return Err(ConfigurationError::batch_threshold(
                "batch threshold must be greater than zero",
            ));
        }
        Ok(Self::with_thresholds(BatchMode::ByCount, Some(threshold), None))
    }

    /// Batch that flushes once `interval` has elapsed.
    pub fn by_time(interval: Duration) -> Result<Self, ConfigurationError> {
        if interval.is_zero() {
            return Err(ConfigurationError::batch_threshold(
                "time interval must be greater than zero",
            ));
        }
        Ok(Self::with_thresholds(BatchMode::ByTime, None, Some(interval)))
    }

    /// Batch that flushes on whichever threshold is reached first.
    pub fn by_time_and_count(interval: Duration, threshold: usize) -> Result<Self, ConfigurationError> {
        if interval.is_zero() || threshold == 0 {
            return Err(ConfigurationError::batch_threshold(
                "bytimecount needs a non-zero time interval and batch threshold",
            ));
        }
        Ok(Self::with_thresholds(
            BatchMode::ByTimeCount,
            Some(threshold),
            Some(interval),
        ))
    }

    const fn with_thresholds(mode: BatchMode, threshold: Option<usize>, interval: Option<Duration>) -> Self {
        Self {
            mode,
            threshold,
            interval,
            is_event_data: false,
            merge_on_send: false,
        }
    }

    /// Decodes each buffered item as an event on flush.
    #[must_use]
    pub const fn with_event_data(mut self, enabled: bool) -> Self {
        self.is_event_data = enabled;
        self
    }

    /// Concatenates the buffered bytes on flush.
    #[must_use]
    pub const fn with_merge_on_send(mut self, enabled: bool) -> Self {
        self.merge_on_send = enabled;
        self
    }

    /// Returns the flush mode.
    #[must_use]
    pub const fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Adds `item` to the buffer and returns the items to emit, if any.
    fn accumulate(&self, store: &mut BatchStore, item: Vec<u8>, now: Instant) -> Option<Vec<Vec<u8>>> {
        if let (Some(interval), Some(start)) = (self.interval, store.window_start) {
            if !store.items.is_empty() && now.saturating_duration_since(start) >= interval {
                let flushed = store.take();
                store.items.push(item);
                store.window_start = Some(now);
                return Some(flushed);
            }
        }

        if store.items.is_empty() {
            store.window_start = Some(now);
        }
        store.items.push(item);

        match self.threshold {
            Some(threshold) if store.items.len() >= threshold => Some(store.take()),
            _ => None,
        }
    }

    fn emit(&self, ctx: &FunctionContext, items: Vec<Vec<u8>>) -> FunctionOutput {
        if self.is_event_data {
            let events = items
                .iter()
                .map(|item| decode_event(item))
                .collect::<Result<Vec<_>, _>>();
            return match events {
                Ok(events) => FunctionOutput::Proceed(Payload::Events(events)),
                Err(err) => FunctionOutput::fail(ctx.error(format!("batched item is not an event: {err}"))),
            };
        }
        if self.merge_on_send {
            return FunctionOutput::Proceed(Payload::Bytes(items.concat()));
        }
        FunctionOutput::Proceed(Payload::Batch(items))
    }
}

#[async_trait]
impl Function for BatchFunction {
    fn name(&self) -> &str {
        "Batch"
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        let item = match coerce_bytes(ctx, &data) {
            Ok(item) => item,
            Err(err) => return FunctionOutput::fail(err),
        };

        let flushed = match ctx
            .with_state::<BatchStore, _, _>(|store| self.accumulate(store, item, Instant::now()))
        {
            Ok(flushed) => flushed,
            Err(err) => return FunctionOutput::fail(ctx.error(err.to_string())),
        };

        match flushed {
            Some(items) => {
                debug!(
                    pipeline_id = %ctx.pipeline_id(),
                    mode = %self.mode,
                    count = items.len(),
                    "batch flushed"
                );
                self.emit(ctx, items)
            }
            None => {
                debug!(pipeline_id = %ctx.pipeline_id(), mode = %self.mode, "item batched");
                FunctionOutput::stop()
            }
        }
    }
}
