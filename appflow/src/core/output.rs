//! Function and run outputs.

use super::{Payload, RunStatus};
use crate::errors::{AppflowError, FunctionError};

/// What a single function returns.
///
/// This is the `(proceed, result)` pair of the function contract:
/// `Proceed` continues with a new payload, `Stop` ends the run silently and
/// `Fail` ends the run with an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutput {
    /// Continue with this payload as the next function's input.
    Proceed(Payload),
    /// Stop the run without an error.
    Stop,
    /// Stop the run and report it as failed.
    Fail(FunctionError),
}

impl FunctionOutput {
    /// Creates a proceeding output.
    #[must_use]
    pub fn proceed(payload: impl Into<Payload>) -> Self {
        Self::Proceed(payload.into())
    }

    /// Creates a silent stop.
    #[must_use]
    pub const fn stop() -> Self {
        Self::Stop
    }

    /// Creates a failing output.
    #[must_use]
    pub const fn fail(error: FunctionError) -> Self {
        Self::Fail(error)
    }

    /// Returns the `proceed` flag of the contract.
    #[must_use]
    pub const fn should_proceed(&self) -> bool {
        matches!(self, Self::Proceed(_))
    }

    /// Returns the proceeding payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Proceed(payload) => Some(payload),
            _ => None,
        }
    }
}

/// The tagged outcome of one pipeline run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every function proceeded; holds the terminal result.
    Completed(Payload),
    /// A function stopped the run without an error.
    FilteredOut,
    /// The run failed.
    Failed(AppflowError),
}

impl RunOutcome {
    /// Returns the status of this outcome.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        match self {
            Self::Completed(_) => RunStatus::Completed,
            Self::FilteredOut => RunStatus::FilteredOut,
            Self::Failed(_) => RunStatus::Failed,
        }
    }

    /// Returns the terminal result of a completed run.
    #[must_use]
    pub const fn result(&self) -> Option<&Payload> {
        match self {
            Self::Completed(payload) => Some(payload),
            _ => None,
        }
    }

    /// Returns the error of a failed run.
    #[must_use]
    pub const fn error(&self) -> Option<&AppflowError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if the run completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if the run was filtered out.
    #[must_use]
    pub const fn is_filtered_out(&self) -> bool {
        matches!(self, Self::FilteredOut)
    }

    /// Returns true if the run failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
