//! Error types for medlem-reg
//!
//! Defines admission-specific error types using thiserror for clear error
//! propagation. Rejections callers must distinguish (event full, not
//! prioritized, not found) are variants of their own, not stringly-typed.

use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for medlem-reg
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] medlem_common::Error),

    /// Event does not exist
    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    /// No active registration for (event, user)
    #[error("Registration not found for user {user_id} on event {event_id}")]
    RegistrationNotFound { event_id: Uuid, user_id: Uuid },

    /// Event is at capacity and waitlisting is disallowed
    #[error("Event is full")]
    EventFull,

    /// Event admits prioritized users only and the arriver is not one
    #[error("Event only admits prioritized users")]
    NotPrioritized,

    /// Operation is not valid for the registration's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Membership or strike oracle unreachable or returned garbage
    ///
    /// Aborts the admission attempt: a prioritization decision is never made
    /// on missing data.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Caller violated a programming contract (e.g. queried the waitlist
    /// position of a user with no waitlisted row)
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for medlem-reg operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is SQLite lock contention (BUSY/LOCKED), safe to
    /// retry with the whole transaction re-run from fresh reads
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                // 5 = SQLITE_BUSY, 6 = SQLITE_LOCKED, 517 = SQLITE_BUSY_SNAPSHOT
                matches!(
                    db_err.code().as_deref(),
                    Some("5") | Some("6") | Some("517")
                )
            }
            Error::Common(medlem_common::Error::Database(sqlx::Error::Database(db_err))) => {
                matches!(
                    db_err.code().as_deref(),
                    Some("5") | Some("6") | Some("517")
                )
            }
            _ => false,
        }
    }

    /// HTTP status this error maps to at the API boundary
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::EventNotFound(_) | Error::RegistrationNotFound { .. } => StatusCode::NOT_FOUND,
            Error::EventFull | Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::NotPrioritized => StatusCode::FORBIDDEN,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Oracle(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) if self.is_lock_contention() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_map_to_client_errors() {
        assert_eq!(Error::EventFull.http_status(), StatusCode::CONFLICT);
        assert_eq!(Error::NotPrioritized.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::EventNotFound(Uuid::new_v4()).http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_contract_violation_is_server_error() {
        let err = Error::Contract("position query for non-member".into());
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_lock_contention());
    }
}
