//! Maps `ServiceError` onto the status codes and bodies the HTTP
//! contract pins for each failure kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use lockd_core::{LockError, ReplicatorError};
use lockd_service::ServiceError;

use crate::responses::ErrorResponse;

/// Render a `ServiceError` as the exact `(status, body)` pair the HTTP
/// contract names for that failure.
pub fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::InvalidArgument(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
        }

        ServiceError::Lock(lock_err) => lock_error_response(lock_err),

        ServiceError::Replicator(repl_err) => replicator_error_response(repl_err),
    }
}

fn lock_error_response(err: LockError) -> Response {
    let message = err.to_string();
    match err {
        LockError::SessionNotFound { session_id } => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                session_id: Some(session_id),
                ..ErrorResponse::new(message)
            }),
        )
            .into_response(),

        LockError::SessionExpired { session_id } => (
            StatusCode::GONE,
            Json(ErrorResponse {
                session_id: Some(session_id),
                ..ErrorResponse::new(message)
            }),
        )
            .into_response(),

        LockError::LockNotFound { resource } => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                resource: Some(resource),
                ..ErrorResponse::new(message)
            }),
        )
            .into_response(),

        LockError::LockAlreadyHeld { resource } => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                resource: Some(resource),
                ..ErrorResponse::new(message)
            }),
        )
            .into_response(),

        LockError::LockNotOwned {
            session_id,
            resource,
        } => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                session_id: Some(session_id),
                resource: Some(resource),
                ..ErrorResponse::new(message)
            }),
        )
            .into_response(),

        LockError::InvalidFenceToken { fence_token } => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                fence_token: Some(fence_token),
                ..ErrorResponse::new(message)
            }),
        )
            .into_response(),

        LockError::InvalidArgument { message } => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
        }
    }
}

fn replicator_error_response(err: ReplicatorError) -> Response {
    let message = err.to_string();
    match err {
        // 421 Misdirected Request: this replica refuses the write but
        // points the caller at whoever it believes holds the lease,
        // rather than forwarding on their behalf.
        ReplicatorError::NotLeader { leader } => (
            StatusCode::MISDIRECTED_REQUEST,
            Json(ErrorResponse {
                leader,
                ..ErrorResponse::new(message)
            }),
        )
            .into_response(),

        ReplicatorError::NoQuorum | ReplicatorError::Timeout => {
            (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse::new(message))).into_response()
        }
    }
}
