//! Typed error types for the overflow-core service layer.

use thiserror::Error;

/// Result type alias for core service operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the overflow-core service layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A mutation was attempted with nobody signed in.
    #[error("You must be signed in to do that. Pass --user <id> or set OVERFLOW_USER.")]
    Unauthorized,

    /// The store rejected (or timed out on) a write.
    #[error("Store write failed: {0:#}")]
    WriteFailed(anyhow::Error),

    /// A snapshot or profile read failed.
    #[error("Store read failed: {0:#}")]
    ReadFailed(anyhow::Error),

    /// The change stream for an issue ended and could not be re-established.
    #[error("Lost the change stream for issue {issue_id}")]
    SubscriptionLost { issue_id: String },

    /// The board has no database yet.
    #[error("No overflow board at {path}. Run 'overflow init' first.")]
    NotInitialized { path: String },

    /// An issue was not found.
    #[error("Issue not found: {issue_id}")]
    IssueNotFound { issue_id: String },

    /// User input failed validation.
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// An internal storage or database error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
