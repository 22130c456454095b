use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    state::{
        AbortError, ApplyError, PlanError,
        state_machine::{Rejection, TransitionError},
    },
};

/// Failures of presenter, controller and public operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A store call failed.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No store is installed; the session is read-only until storage returns.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Missing, invalid or superseded presenter token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Payload refused before touching the session.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Command not allowed in the current phase, or refused by its guard.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Unknown room code.
    #[error("not found: {0}")]
    NotFound(String),
    /// The catalog has no unused question left for the selected category.
    #[error("question pool exhausted: {0}")]
    Exhausted(String),
    /// The transition did not finish in time and was aborted.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// HTTP-facing error; the body is `{ "code": ..., "message": ... }`.
#[derive(Debug, Error)]
pub enum AppError {
    /// `400`: malformed or out-of-range payload.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// `401`: presenter token missing or stale.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// `404`: unknown room.
    #[error("not found: {0}")]
    NotFound(String),
    /// `409`: the session is not in a phase that accepts the command.
    #[error("conflict: {0}")]
    Conflict(String),
    /// `503`: storage down or transition timed out.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ServiceUnavailable(_) => "unavailable",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Exhausted(category) => {
                AppError::Conflict(format!("no unused question left in `{category}`"))
            }
            ServiceError::Timeout => AppError::ServiceUnavailable("transition timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        });
        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("state transition already pending".into())
            }
            PlanError::Transition(TransitionError::Invalid(invalid)) => {
                ServiceError::InvalidState(invalid.to_string())
            }
            PlanError::Transition(TransitionError::Rejected(rejection)) => rejection.into(),
        }
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::RoomNotFound(_) => ServiceError::NotFound(rejection.to_string()),
            Rejection::InvalidConfig(_)
            | Rejection::EmptyCategory
            | Rejection::UnknownHistoryItem(_) => ServiceError::InvalidInput(rejection.to_string()),
            _ => ServiceError::InvalidState(rejection.to_string()),
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "state changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => {
                ServiceError::InvalidState(format!(
                    "state version mismatch during transition (expected {expected}, got {actual})"
                ))
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{session::SessionPhase, state_machine::{CommandKind, InvalidTransition}};

    #[test]
    fn rejections_map_to_http_statuses() {
        let not_found: AppError =
            ServiceError::from(PlanError::Transition(Rejection::RoomNotFound("9999".into()).into()))
                .into();
        assert!(matches!(not_found, AppError::NotFound(_)));

        let bad: AppError = ServiceError::from(PlanError::Transition(
            Rejection::UnknownHistoryItem(4).into(),
        ))
        .into();
        assert!(matches!(bad, AppError::BadRequest(_)));

        let conflict: AppError = ServiceError::from(PlanError::Transition(
            InvalidTransition {
                from: SessionPhase::Review,
                command: CommandKind::Judge,
            }
            .into(),
        ))
        .into();
        assert!(matches!(conflict, AppError::Conflict(_)));

        let paused: AppError = ServiceError::from(Rejection::Paused).into();
        assert!(matches!(paused, AppError::Conflict(_)));
    }

    #[test]
    fn degraded_store_is_unavailable() {
        let err: AppError = ServiceError::Degraded.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "unavailable");
    }

    #[test]
    fn exhausted_pool_is_a_conflict() {
        let err: AppError = ServiceError::Exhausted("台灣史".into()).into();
        assert!(matches!(err, AppError::Conflict(message) if message.contains("台灣史")));
    }
}
