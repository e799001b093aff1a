//! # Appflow
//!
//! An embeddable runtime that runs a chain of functions, a *pipeline*,
//! every time a data event arrives, and routes the result back out.
//!
//! Appflow provides:
//!
//! - **A uniform function contract**: every step proceeds, stops silently, or fails
//! - **Sequential execution**: functions run in configured order with early abort
//! - **Batching**: a stateful built-in that accumulates items by count or time
//! - **Triggers**: HTTP request/response and message-bus publish/subscribe
//! - **A dispatcher**: bounded concurrency, deadlines and run counters
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use appflow::prelude::*;
//!
//! let config = AppConfig::load("configuration.yaml")?;
//! init_tracing(&config.writable.logging).ok();
//!
//! let registry = Arc::new(config.build_registry()?);
//! let trigger = build_trigger(&config, registry, None)?;
//!
//! let shutdown = ShutdownToken::new();
//! trigger.run(shutdown).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod functions;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod trigger;
pub mod utils;

pub use errors::{AppflowError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{InFlightRuns, ShutdownToken};
    pub use crate::config::{AppConfig, LogFormat, LoggingConfig, TargetType, TriggerType};
    pub use crate::context::{
        FunctionContext, FunctionKey, InMemorySecretProvider, PipelineContext, SecretProvider,
    };
    pub use crate::core::{Event, FunctionOutput, Metric, Payload, Reading, RunOutcome, RunStatus};
    pub use crate::dispatcher::{Dispatched, Dispatcher, DispatcherStats, InboundMessage};
    pub use crate::errors::{AppflowError, ConfigurationError, ErrorInfo, FunctionError, Result};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::functions::{build_function, FnFunction, Function, FunctionParameters};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineRegistry};
    pub use crate::trigger::{
        build_trigger, HttpTrigger, InMemoryMessageBus, MessageBusTrigger, MessageClient,
        MessageEnvelope, Trigger,
    };
    pub use std::sync::Arc;
}
