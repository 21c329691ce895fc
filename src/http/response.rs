//! Responses the gateway produces itself.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::script::ScriptExit;

/// No route matched the request.
pub fn route_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error_msg": "404 Route Not Found" })),
    )
        .into_response()
}

pub fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(serde_json::json!({ "error_msg": "502 Bad Gateway" })),
    )
        .into_response()
}

pub fn no_upstream() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error_msg": "503 No Upstream Available" })),
    )
        .into_response()
}

/// Response requested by a script through `ctx.exit`.
pub fn script_exit(exit: ScriptExit) -> Response {
    let status = StatusCode::from_u16(exit.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(exit.body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_body() {
        let response = route_not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"error_msg":"404 Route Not Found"}"#);
    }

    #[test]
    fn test_script_exit() {
        let response = script_exit(ScriptExit {
            status: 403,
            body: "denied".into(),
        });
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
