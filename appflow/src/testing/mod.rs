//! Testing utilities for appflow pipelines.
//!
//! This module provides:
//! - Mock functions
//! - Event fixtures and a pipeline test harness
//! - Assertions over run outcomes

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_completed, assert_completed_with, assert_failed_with, assert_filtered_out,
    assert_status,
};
pub use fixtures::{
    run_pipeline, sample_event, sample_event_json, TestPipeline, SAMPLE_PROFILE, SAMPLE_RESOURCE,
};
pub use mocks::{FailingFunction, FilterOutFunction, MockFunction, RecordingFunction, SlowFunction};
