//! Error taxonomy shared by every forum operation.
//!
//! Callers only ever see four outcomes besides success: validation,
//! not-found, authorization and conflict. Storage, pool and task failures
//! are internal and surface on the wire as a generic internal error.

use std::fmt::Display;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Message shown for every missing, deleted or foreign entity.
pub const NOT_FOUND_MESSAGE: &str = "this content is no longer available";

/// Failure of a forum operation.
#[derive(Debug, Error)]
pub enum ForumError {
    /// Input failed a length, range or emptiness check.
    #[error("{0}")]
    Validation(String),
    /// Target missing, soft-deleted or outside the caller's view. The
    /// entity name is kept for logs only.
    #[error("{NOT_FOUND_MESSAGE}")]
    NotFound(&'static str),
    /// Caller lacks the privilege or ownership the operation requires.
    #[error("{0}")]
    Authorization(&'static str),
    /// Stored state disagrees with the request, such as a duplicate slug or
    /// a counter that no longer exists.
    #[error("{0}")]
    Conflict(String),
    /// Database failure.
    #[error("storage error: {0}")]
    Storage(#[from] DieselError),
    /// Could not obtain a pooled connection.
    #[error("connection pool error: {0}")]
    Pool(String),
    /// A spawned write task panicked or was cancelled.
    #[error("operation interrupted")]
    Interrupted,
}

/// Convenience alias for forum results.
pub type ForumResult<T> = Result<T, ForumError>;

impl ForumError {
    /// Build a [`ForumError::Validation`] from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

    /// Build a [`ForumError::Conflict`] from any displayable message.
    pub fn conflict(msg: impl Into<String>) -> Self { Self::Conflict(msg.into()) }

    /// Wrap a pool checkout failure.
    pub fn pool<E: Display>(err: E) -> Self { Self::Pool(err.to_string()) }

    /// Whether retrying the same read could plausibly succeed.
    ///
    /// Pool exhaustion, dropped connections, serialisation failures and
    /// `SQLite` lock contention qualify. Everything else is deterministic.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Storage(DieselError::DatabaseError(kind, info)) => match kind {
                DatabaseErrorKind::SerializationFailure
                | DatabaseErrorKind::ClosedConnection
                | DatabaseErrorKind::UnableToSendCommand => true,
                _ => {
                    let msg = info.message();
                    msg.contains("database is locked") || msg.contains("database is busy")
                }
            },
            _ => false,
        }
    }

    /// Whether the failure is internal rather than caused by the caller.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Pool(_) | Self::Interrupted)
    }
}

/// Map a diesel unique violation to [`ForumError::Conflict`].
pub(crate) fn conflict_on_unique(err: DieselError, msg: &str) -> ForumError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ForumError::conflict(msg)
        }
        other => ForumError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn not_found_hides_entity_name() {
        let err = ForumError::NotFound("reply");
        assert_eq!(err.to_string(), NOT_FOUND_MESSAGE);
    }

    #[rstest]
    #[case(ForumError::pool("timed out"), true)]
    #[case(ForumError::Storage(DieselError::NotFound), false)]
    #[case(ForumError::validation("empty"), false)]
    #[case(ForumError::Interrupted, false)]
    fn transient_classification(#[case] err: ForumError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }

    #[rstest]
    fn internal_errors_are_flagged() {
        assert!(ForumError::Interrupted.is_internal());
        assert!(!ForumError::Authorization("nope").is_internal());
    }
}
