//! HTTP boundary: an axum `Router` translating the REST surface onto
//! `lockd_service::Service`.

pub mod error;
pub mod extract;
pub mod responses;
pub mod routes;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use lockd_service::Service;

/// Cloneable state every handler extracts via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build the full route table.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/sessions", post(routes::create_session))
        .route(
            "/sessions/{session_id}",
            get(routes::get_session).delete(routes::delete_session),
        )
        .route(
            "/sessions/{session_id}/keepalive",
            post(routes::keepalive),
        )
        .route(
            "/sessions/{session_id}/locks/{resource}",
            post(routes::acquire_lock).delete(routes::release_lock),
        )
        .route("/locks/{resource}", get(routes::lock_info))
        .route("/admin/cleanup", post(routes::cleanup))
        .route("/admin/stats", get(routes::stats))
        .route("/admin/cluster", get(routes::cluster_status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc as StdArc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use lockd_core::{SystemClock, UuidGen};
    use lockd_raft::SingleNodeReplicator;

    fn app() -> Router {
        let replicator = StdArc::new(SingleNodeReplicator::new("127.0.0.1:7000".into()));
        let state_machine = replicator.state_machine();
        let service = Service::new(
            replicator,
            state_machine,
            StdArc::new(SystemClock),
            StdArc::new(UuidGen),
        );
        create_router(AppState::new(service))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_session_then_acquire_and_release_lock() {
        let app = app();

        let create_req = Request::builder()
            .method("POST")
            .uri("/sessions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"client_id":"c1","timeout":60}"#))
            .unwrap();
        let response = app.clone().oneshot(create_req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let session_id = created["session_id"].as_str().unwrap().to_string();

        let acquire_req = Request::builder()
            .method("POST")
            .uri(format!("/sessions/{session_id}/locks/R"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(acquire_req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let acquired: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let fence_token = acquired["fence_token"].as_u64().unwrap();

        let release_req = Request::builder()
            .method("DELETE")
            .uri(format!(
                "/sessions/{session_id}/locks/R?fence_token={fence_token}"
            ))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(release_req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_unknown_session_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/sessions/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
