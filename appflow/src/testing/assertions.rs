//! Test assertions for run outcomes.

use crate::core::{Payload, RunOutcome, RunStatus};

/// Asserts that the run completed.
pub fn assert_completed(outcome: &RunOutcome) {
    assert!(
        outcome.is_completed(),
        "Expected completed run, got: {outcome:?}"
    );
}

/// Asserts that the run completed with `expected` as terminal result.
pub fn assert_completed_with(outcome: &RunOutcome, expected: &Payload) {
    assert_eq!(
        outcome.result(),
        Some(expected),
        "Expected terminal result {expected:?}, got: {outcome:?}"
    );
}

/// Asserts that the run was filtered out.
pub fn assert_filtered_out(outcome: &RunOutcome) {
    assert!(
        outcome.is_filtered_out(),
        "Expected filtered-out run, got: {outcome:?}"
    );
}

/// Asserts that the run failed and its error message contains `needle`.
pub fn assert_failed_with(outcome: &RunOutcome, needle: &str) {
    let Some(err) = outcome.error() else {
        panic!("Expected failed run, got: {outcome:?}");
    };
    assert!(
        err.to_string().contains(needle),
        "Expected error containing '{needle}', got: {err}"
    );
}

/// Asserts that the run has the expected status.
pub fn assert_status(outcome: &RunOutcome, expected: RunStatus) {
    assert_eq!(
        outcome.status(),
        expected,
        "Expected status {expected:?}, got {:?}",
        outcome.status()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppflowError;

    #[test]
    fn test_assertions_pass() {
        let done = RunOutcome::Completed(Payload::from("ok"));
        assert_completed(&done);
        assert_completed_with(&done, &Payload::from("ok"));
        assert_status(&done, RunStatus::Completed);

        assert_filtered_out(&RunOutcome::FilteredOut);
        assert_failed_with(&RunOutcome::Failed(AppflowError::transport("broker down")), "broker down");
    }

    #[test]
    #[should_panic(expected = "Expected completed run")]
    fn test_assert_completed_panics() {
        assert_completed(&RunOutcome::FilteredOut);
    }

    #[test]
    #[should_panic(expected = "Expected failed run")]
    fn test_assert_failed_panics() {
        assert_failed_with(&RunOutcome::FilteredOut, "x");
    }
}
