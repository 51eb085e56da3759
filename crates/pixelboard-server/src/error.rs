//! The HTTP error taxonomy and response envelope.
//!
//! Every failure a handler can surface becomes an [`ApiError`], which maps
//! to a status code and a `{"msg": .., "code": ..}` JSON body. Server
//! faults (5xx) log the underlying error and reply with a generic message
//! so internals never leak to clients; client faults (4xx) reply with the
//! error text itself.

use std::any::Any;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pixelboard_db::{CacheError, StoreError};

use crate::captcha::CaptchaError;

/// Errors surfaced by route handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be parsed or failed validation.
    #[error("{0}")]
    BadInput(String),

    /// The placement was rejected (CAPTCHA failure or active cooldown).
    #[error("{0}")]
    Unauthorized(String),

    /// The requested pixel has never been placed.
    #[error("tile not found")]
    TileNotFound,

    /// A cache operation failed, including blob corruption.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A store operation failed.
    #[error(transparent)]
    Store(StoreError),

    /// The CAPTCHA verifier failed.
    #[error(transparent)]
    Captcha(#[from] CaptchaError),

    /// The background write queue is full.
    #[error("server is overloaded, try again later")]
    Overloaded,

    /// An internal contract was violated.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TileNotFound => Self::TileNotFound,
            other => Self::Store(other),
        }
    }
}

impl ApiError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::Captcha(CaptchaError::Rejected) => {
                StatusCode::UNAUTHORIZED
            }
            Self::TileNotFound => StatusCode::NOT_FOUND,
            Self::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cache(_) | Self::Store(_) | Self::Captcha(_) | Self::Invariant(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let msg = if status.is_server_error() {
            tracing::error!(error = %self, "request failed with a server error");
            String::from("an unexpected error has occurred")
        } else {
            tracing::info!(error = %self, "request failed with a client error");
            self.to_string()
        };

        let body = serde_json::json!({
            "msg": msg,
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

/// Panic handler for the route boundary: recover and answer with the
/// standard 500 envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    tracing::error!(panic = detail, "panic in route handler");

    let body = serde_json::json!({
        "msg": "an unexpected error has occurred",
        "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_envelope() {
        let response = ApiError::TileNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["msg"], "tile not found");
        assert_eq!(json["code"], 404);
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let response =
            ApiError::BadInput(String::from("x must be an integer, got nope")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["msg"], "x must be an integer, got nope");
        assert_eq!(json["code"], 400);
    }

    #[tokio::test]
    async fn server_errors_hide_internals() {
        let response = ApiError::Invariant(String::from("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["msg"], "an unexpected error has occurred");
        assert_eq!(json["code"], 500);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Captcha(CaptchaError::Rejected).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Captcha(CaptchaError::RetriesExhausted(5)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Overloaded.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::from(StoreError::TileNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }
}
