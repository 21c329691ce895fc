//! Admin API error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::route::RouteError;
use crate::store::StoreError;

/// Body of every admin error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Route(RouteError::Store(e))
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Route(RouteError::Script(_)) => "invalid_script",
            Self::Route(RouteError::Store(e)) => match e {
                StoreError::NotFound(_) => "not_found",
                StoreError::AlreadyExists(_) => "conflict",
                StoreError::Unavailable(_) => "store_unavailable",
                _ => "store_error",
            },
            Self::Route(_) => "invalid_route",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Route(RouteError::Store(e)) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Route(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Admin request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for admin handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
            (
                RouteError::ScriptIdWithoutId { script_id: "s".into() }.into(),
                StatusCode::BAD_REQUEST,
                "invalid_route",
            ),
            (
                RouteError::Script(ScriptError::Syntax { detail: "eof".into() }).into(),
                StatusCode::BAD_REQUEST,
                "invalid_script",
            ),
            (StoreError::NotFound("r".into()).into(), StatusCode::NOT_FOUND, "not_found"),
            (StoreError::AlreadyExists("r".into()).into(), StatusCode::CONFLICT, "conflict"),
            (
                StoreError::Unavailable("down".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
            ),
            (
                StoreError::Corrupt("bad".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
            assert_eq!(err.code(), code);
        }
    }
}
