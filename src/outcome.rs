use serde::Serialize;
use std::fmt;

/// Whether an item is sent to the completion service or only previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    /// Call the completion service
    #[default]
    Live,
    /// Compose the request and stop
    DryRun,
}

impl ProcessMode {
    /// Maps the dry-run flag onto a mode.
    #[must_use]
    pub const fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Live }
    }

    /// Returns true for [`ProcessMode::DryRun`].
    #[must_use]
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Terminal result of processing one input item.
///
/// Every item produces exactly one outcome and outcomes are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// The service produced content for the item.
    Success(SuccessRecord),

    /// The item could not be processed.
    Failure(FailureRecord),

    /// Dry-run result: the request that would have been sent.
    DryRunPreview {
        /// Name of the input the request was composed for
        input_name: String,
        /// Fully composed request text
        composed_request_text: String,
    },
}

impl ProcessingOutcome {
    /// Creates a failure outcome.
    #[must_use]
    pub fn failure(input_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failure(FailureRecord {
            input_name: input_name.into(),
            reason: reason.into(),
        })
    }
}

/// Processed content and the name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessRecord {
    /// Output file name (already transformed)
    pub output_file_name: String,

    /// Processed content
    pub content: String,
}

/// A per-item failure, reported but never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Input the failure belongs to
    pub input_name: String,

    /// Human-readable reason
    pub reason: String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.input_name, self.reason)
    }
}
