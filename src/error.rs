use std::path::PathBuf;

use thiserror::Error;

/// Typed failures raised by the sort pipeline.
///
/// Public operations return [anyhow::Error]; use `downcast_ref::<SortError>()` to tell these
/// categories apart from plain I/O failures.
#[derive(Debug, Error)]
pub enum SortError {
    /// The input does not follow the configured line format.
    #[error("malformed input {path}: {reason}")]
    MalformedInput {
        path: PathBuf,
        reason: String,
    },
    /// The run was cancelled through its [CancellationToken](crate::cancellation::CancellationToken).
    #[error("sort cancelled")]
    Cancelled,
    /// The sort definition cannot be executed as configured.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SortError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> SortError {
        SortError::MalformedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Returns true when the root of `error` is [SortError::Cancelled].
pub fn is_cancelled(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<SortError>(), Some(SortError::Cancelled))
}

/// Returns true when the root of `error` is [SortError::MalformedInput].
pub fn is_malformed_input(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<SortError>(), Some(SortError::MalformedInput { .. }))
}
