//! Run status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every function proceeded.
    Completed,
    /// A function stopped the run without an error.
    FilteredOut,
    /// A function, the transport, or a deadline failed the run.
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::FilteredOut => write!(f, "filtered_out"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl RunStatus {
    /// Returns true if the run did not fail.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::FilteredOut)
    }

    /// Returns true if the run failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert_eq!(RunStatus::FilteredOut.to_string(), "filtered_out");
        assert_eq!(RunStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_filtered_out_is_success() {
        assert!(RunStatus::FilteredOut.is_success());
        assert!(!RunStatus::FilteredOut.is_failure());
        assert!(RunStatus::Failed.is_failure());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&RunStatus::FilteredOut).unwrap();
        assert_eq!(json, "\"filtered_out\"");
    }
}
