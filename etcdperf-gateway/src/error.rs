//! Error types for the gateway API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use etcdperf_client::StoreError;
use etcdperf_types::ErrorResponse;
use thiserror::Error;

/// Error type for API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Errors from the store behind the gateway.
    #[error("Etcd service unavailable or error")]
    Store(#[from] StoreError),

    /// The request body is missing required fields or is not valid JSON.
    #[error("Key and value required")]
    BadRequest,

    /// The requested key does not exist.
    #[error("Key not found")]
    NotFound,
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.to_string());
        let (status, body) = match &self {
            ApiError::Store(err) => {
                tracing::error!(
                    error = err as &dyn std::error::Error,
                    "store error handling request"
                );
                (StatusCode::SERVICE_UNAVAILABLE, body.with_details(details(err)))
            }
            ApiError::BadRequest => {
                tracing::debug!("bad request: {self}");
                (StatusCode::BAD_REQUEST, body)
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, body),
        };

        (status, Json(body)).into_response()
    }
}

/// Renders an error and its sources as `error: source: source`.
fn details(err: &(dyn std::error::Error + 'static)) -> String {
    std::iter::successors(Some(err), |err| err.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}
