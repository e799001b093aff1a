//! Lifecycle event sinks.
//!
//! The executor reports `pipeline.*` and `function.*` events through the
//! sink carried by each run's context.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
