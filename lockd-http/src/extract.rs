//! Extractors that reject malformed request bodies/query strings with
//! the same spec-shaped `400 {"error": ...}` body `Service`'s own
//! validation failures produce, instead of axum's built-in rejection
//! handling (a bare-text `422`/`400` with no JSON envelope).

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::response::Response;
use axum::Json as AxumJson;
use serde::de::DeserializeOwned;

use lockd_service::ServiceError;

use crate::error::error_response;

/// `axum::Json<T>`, but a parse failure is rendered through
/// `error::error_response` rather than axum's default rejection.
pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match AxumJson::<T>::from_request(req, state).await {
            Ok(AxumJson(value)) => Ok(Json(value)),
            Err(rejection) => Err(error_response(ServiceError::invalid(rejection.to_string()))),
        }
    }
}

/// `axum::extract::Query<T>`, but a parse failure (a missing or
/// non-numeric `fence_token`, say) is rendered the same way.
pub struct Query<T>(pub T);

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Query(value)),
            Err(rejection) => Err(error_response(ServiceError::invalid(rejection.to_string()))),
        }
    }
}
