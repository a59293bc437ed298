use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{journal::JournalError, remote::RemoteError},
    state::game::SessionError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current lifecycle state.
    #[error("invalid session state: {0}")]
    InvalidSessionState(String),
    /// The game is final.
    #[error("session is finalized")]
    SessionFinalized,
    /// Undo requested with nothing recorded.
    #[error("event log is empty")]
    EmptyLog,
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// No game is loaded.
    #[error("no session loaded")]
    NoSession,
    /// The journal of the requested game cannot be trusted; it must be reset.
    #[error("corrupted journal: {0}")]
    CorruptedJournal(String),
    /// The Ledger or provider could not be reached.
    #[error("network failure")]
    NetworkFailure(#[source] RemoteError),
    /// The Ledger or provider answered with a non-success status.
    #[error("server rejected request ({status}): {message}")]
    ServerRejection { status: u16, message: String },
    /// Local and Ledger totals disagree.
    #[error("reconciliation conflict on {players} player(s)")]
    ReconciliationConflict { players: usize },
    /// Local journal storage failed.
    #[error("journal unavailable")]
    Journal(#[source] JournalError),
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidInput(message) => ServiceError::InvalidInput(message),
            SessionError::InvalidSessionState(message) => {
                ServiceError::InvalidSessionState(message)
            }
            SessionError::SessionFinalized => ServiceError::SessionFinalized,
            SessionError::EmptyLog => ServiceError::EmptyLog,
            SessionError::CorruptedJournal(message) => ServiceError::CorruptedJournal(message),
        }
    }
}

impl From<RemoteError> for ServiceError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected { status, message } => {
                ServiceError::ServerRejection { status, message }
            }
            other => ServiceError::NetworkFailure(other),
        }
    }
}

impl From<JournalError> for ServiceError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Corrupted { .. } => ServiceError::CorruptedJournal(err.to_string()),
            other => ServiceError::Journal(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Upstream answered with an error.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Upstream unreachable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::InvalidSessionState(_)
            | ServiceError::SessionFinalized
            | ServiceError::EmptyLog
            | ServiceError::NoSession
            | ServiceError::CorruptedJournal(_)
            | ServiceError::ReconciliationConflict { .. } => AppError::Conflict(message),
            ServiceError::ServerRejection { .. } => AppError::BadGateway(message),
            ServiceError::NetworkFailure(source) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::Journal(source) => AppError::Internal(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
