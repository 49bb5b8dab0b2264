// src/errors.rs
// Typed failure taxonomy. Row validation and per-business sync failures are
// collected into lists and returned to the caller; format and duplicate
// conditions short-circuit; unexpected errors abort the submission.

use thiserror::Error;

/// A single skipped row, recorded with its 1-based spreadsheet row number.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RowValidationError {
    pub row: usize,
    pub error: String,
}

/// A per-business failure during a sync run. The run continues to the next
/// business; these are surfaced in the final report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncFailure {
    pub business: String,
    pub cause: String,
}

/// Attempt to act on a review record that is missing or no longer pending.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("review for item {item_id} not found or already handled")]
pub struct StateConflict {
    pub item_id: i64,
}

/// A review decision that is malformed regardless of record state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid review decision: {reason}")]
pub struct InvalidReviewChoice {
    pub reason: &'static str,
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The file cannot be processed at all; no rows were touched.
    #[error("{message}\n{hint}")]
    FileFormat { message: String, hint: String },

    /// A required column is absent from the header row.
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// The external catalog service failed; callers degrade to an empty pool.
    #[error("catalog service unavailable: {0}")]
    ExternalService(String),

    /// Unhandled failure mid-run; the whole submission is rolled back.
    #[error("submission processing aborted: {0}")]
    Aborted(#[from] anyhow::Error),
}

impl ProcessingError {
    pub fn file_format(message: impl Into<String>) -> Self {
        Self::FileFormat {
            message: message.into(),
            hint: "Try re-saving the file from your spreadsheet application, or convert it to \
                   CSV (File -> Save As -> CSV) and upload that instead."
                .to_string(),
        }
    }
}
