//! Error type for the HTTP handlers.
//!
//! Implements `IntoResponse` so handlers can use `?` and still answer with a
//! JSON `ErrorResponse` and a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use conffree_shared::ErrorResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::NotFound(resource) => {
                tracing::debug!("{} not found", resource);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("not_found", self.to_string()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_maps_to_404_json() {
        let response = ApiError::not_found("Room x@example.com").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "not_found");
        assert_eq!(body.message, "Room x@example.com not found");
    }
}
