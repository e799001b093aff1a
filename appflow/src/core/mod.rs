//! Core domain model types for appflow.
//!
//! This module contains the fundamental types used throughout the runtime:
//! - Event and reading records
//! - Metric records
//! - The payload threaded between functions
//! - Function outputs and run outcomes

mod event;
mod metric;
mod output;
mod payload;
mod status;

pub use event::{
    decode_event, normalize_value_type, AddEventRequest, Event, Reading, API_VERSION,
    VALUE_TYPES, VALUE_TYPE_BINARY, VALUE_TYPE_OBJECT, VALUE_TYPE_STRING,
};
pub use metric::{validate_metric_name, Metric, MetricField, MetricTag, MetricValue};
pub use output::{FunctionOutput, RunOutcome};
pub use payload::Payload;
pub use status::RunStatus;
