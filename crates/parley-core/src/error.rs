//! Store error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Input rejected before any id is reserved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Display name is empty.
    #[error("username must not be empty")]
    EmptyUsername,

    /// Message body is empty.
    #[error("message body must not be empty")]
    EmptyBody,

    /// Display name exceeds the gateway limit.
    #[error("username too long: {len} characters (max {max})")]
    UsernameTooLong {
        /// Length in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Body exceeds the gateway limit.
    #[error("message too long: {len} characters (max {max})")]
    BodyTooLong {
        /// Length in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Errors from [`crate::MessageStore`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Input rejected; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failed or timed out; nothing was partially applied.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable {
        /// Description of the storage failure.
        reason: String,
    },
}

impl StoreError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Validation failures need different input; storage failures are
    /// transient from the store's point of view.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        Self::StorageUnavailable { reason: err.to_string() }
    }
}
