//! Route handlers. Each function does just enough extraction and
//! validation to call into `Service`; all error-shape decisions live in
//! `error::error_response`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::error::error_response;
use crate::extract::{Json as ValidatedJson, Query as ValidatedQuery};
use crate::responses::{
    AcquireLockResponse, ClusterStatusResponse, CreateSessionResponse, DeleteSessionResponse,
    HealthResponse, KeepaliveResponse, LockInfoResponse, ReleaseLockResponse, SessionResponse,
    StatsResponse,
};
use crate::AppState;

const SERVICE_NAME: &str = "lockd";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health(State(state): State<AppState>) -> Response {
    let service = &state.service;
    Json(HealthResponse {
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        status: "healthy",
        timestamp: service.now(),
        is_leader: service.is_leader(),
        leader: service.leader(),
        is_ready: service.is_ready(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub client_id: String,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
}

fn default_timeout() -> u32 {
    60
}

pub async fn create_session(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateSessionRequest>,
) -> Response {
    match state
        .service
        .create_session(&body.client_id, body.timeout)
        .await
    {
        Ok(created) => (
            StatusCode::CREATED,
            Json(CreateSessionResponse {
                session_id: created.session_id,
                client_id: created.client_id,
                timeout: created.timeout_secs,
                keepalive_interval: created.timeout_secs / 3,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.service.get_session(&session_id) {
        Ok(view) => Json(SessionResponse::from(view)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn keepalive(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.service.keepalive(&session_id).await {
        Ok(()) => Json(KeepaliveResponse {
            updated: true,
            session_id,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.service.delete_session(&session_id).await {
        Ok(()) => Json(DeleteSessionResponse {
            deleted: true,
            session_id,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn acquire_lock(
    State(state): State<AppState>,
    Path((session_id, resource)): Path<(String, String)>,
) -> Response {
    match state.service.acquire_lock(&session_id, &resource).await {
        Ok(fence_token) => (
            StatusCode::CREATED,
            Json(AcquireLockResponse {
                session_id,
                resource,
                fence_token,
                acquired: true,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReleaseLockQuery {
    pub fence_token: u64,
}

pub async fn release_lock(
    State(state): State<AppState>,
    Path((session_id, resource)): Path<(String, String)>,
    ValidatedQuery(query): ValidatedQuery<ReleaseLockQuery>,
) -> Response {
    match state
        .service
        .release_lock(&session_id, &resource, query.fence_token)
        .await
    {
        Ok(()) => Json(ReleaseLockResponse {
            session_id,
            resource,
            fence_token: query.fence_token,
            released: true,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /locks/{resource}` — additive read-only lookup.
pub async fn lock_info(State(state): State<AppState>, Path(resource): Path<String>) -> Response {
    let lock = state.service.lock_info(&resource);
    Json(LockInfoResponse::from_lock(&resource, lock)).into_response()
}

/// Body on success is a bare integer count, not an object.
pub async fn cleanup(State(state): State<AppState>) -> Response {
    match state.service.cleanup_expired().await {
        Ok(count) => Json(count).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn stats(State(state): State<AppState>) -> Response {
    Json(StatsResponse::from(state.service.stats())).into_response()
}

pub async fn cluster_status(State(state): State<AppState>) -> Response {
    let (status, stats) = state.service.cluster_status();
    Json(ClusterStatusResponse::new(status, stats)).into_response()
}
