//! Graceful shutdown utilities.
//!
//! This module provides:
//! - ShutdownToken for signalling triggers to stop
//! - InFlightRuns for draining runs that already started

mod task_group;
mod token;

pub use task_group::InFlightRuns;
pub use token::{ShutdownCallback, ShutdownToken};
