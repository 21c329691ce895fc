//! Admin control plane API.
//!
//! # Endpoints
//! ```text
//! POST   /apisix/admin/routes        create (id from body or generated)
//! GET    /apisix/admin/routes        list
//! PUT    /apisix/admin/routes/{id}   create or replace
//! GET    /apisix/admin/routes/{id}   read
//! DELETE /apisix/admin/routes/{id}   delete
//! GET    /apisix/admin/logs          captured script log (?format=text)
//! DELETE /apisix/admin/logs          clear script log
//! GET    /apisix/admin/status        version, store and worker revisions
//! ```

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::lifecycle::ShutdownSignal;
use crate::observability::ScriptLog;
use crate::route::RouteService;
use crate::runtime::WorkerPool;

use self::auth::admin_auth_middleware;
use self::handlers::*;

pub use error::{ApiError, ApiResult};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub service: RouteService,
    pub log: ScriptLog,
    pub pool: Arc<WorkerPool>,
    pub api_key: Arc<str>,
    pub settle_timeout: Duration,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/apisix/admin/routes", get(list_routes).post(create_route))
        .route(
            "/apisix/admin/routes/{id}",
            get(get_route).put(put_route).delete(delete_route),
        )
        .route("/apisix/admin/logs", get(get_logs).delete(clear_logs))
        .route("/apisix/admin/status", get(get_status))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(listener: TcpListener, state: AdminState, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown.wait())
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PropagationConfig, ScriptConfig};
    use crate::script::{RhaiEngine, ScriptEngine};
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state(api_key: &str) -> AdminState {
        let script = ScriptConfig::default();
        let engine: Arc<dyn ScriptEngine> = Arc::new(RhaiEngine::new(&script));
        let store = Arc::new(MemoryStore::new(16, None));
        let log = ScriptLog::new(16);
        AdminState {
            service: RouteService::new(store, engine.clone()),
            log: log.clone(),
            pool: Arc::new(WorkerPool::new(1, engine, &script, &PropagationConfig::default(), log)),
            api_key: Arc::from(api_key),
            settle_timeout: Duration::from_millis(100),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let router = setup_admin_router(state(""));
        let body = r#"{"uri":"/hello","upstream":{"type":"roundrobin","nodes":{"127.0.0.1:1980":1}},"script":"fn access(ctx) { ctx.log_warn(\"hi\"); }"}"#;

        let (status, json) = send(&router, json_request("PUT", "/apisix/admin/routes/r1", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], "r1");
        assert_eq!(json["revision"], 1);

        let (status, json) = send(&router, json_request("GET", "/apisix/admin/routes/r1", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["uri"], "/hello");
        assert!(json.get("script_id").is_none());

        let (status, _) = send(&router, json_request("DELETE", "/apisix/admin/routes/r1", "")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(&router, json_request("GET", "/apisix/admin/routes/r1", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn test_rejections_are_400() {
        let router = setup_admin_router(state(""));

        let bad_script = r#"{"uri":"/a","upstream":{"nodes":{"127.0.0.1:1":1}},"script":"fn access(ctx) {"}"#;
        let (status, json) = send(&router, json_request("PUT", "/apisix/admin/routes/r1", bad_script)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_script");

        let unknown_field = r#"{"uri":"/a","scrpt":"x"}"#;
        let (status, json) = send(&router, json_request("PUT", "/apisix/admin/routes/r1", unknown_field)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "bad_request");

        let (_, json) = send(&router, json_request("GET", "/apisix/admin/routes", "")).await;
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn test_post_conflict() {
        let router = setup_admin_router(state(""));
        let body = r#"{"id":"r1","uri":"/a","upstream":{"nodes":{"127.0.0.1:1":1}}}"#;

        let (status, _) = send(&router, json_request("POST", "/apisix/admin/routes", body)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = send(&router, json_request("POST", "/apisix/admin/routes", body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "conflict");
    }

    #[tokio::test]
    async fn test_auth_required_when_key_set() {
        let router = setup_admin_router(state("secret"));

        let (status, json) = send(&router, json_request("GET", "/apisix/admin/status", "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "unauthorized");

        let mut req = json_request("GET", "/apisix/admin/status", "");
        req.headers_mut().insert("authorization", "Bearer secret".parse().unwrap());
        let (status, json) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "operational");
    }

    #[tokio::test]
    async fn test_logs_read_and_clear() {
        let state = state("");
        state.log.push(crate::observability::ScriptLogLevel::Warn, "r1", "access", "hit");
        let router = setup_admin_router(state);

        let (_, json) = send(&router, json_request("GET", "/apisix/admin/logs", "")).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["entries"][0]["message"], "hit");

        let (_, json) = send(&router, json_request("DELETE", "/apisix/admin/logs", "")).await;
        assert_eq!(json["cleared"], 1);

        let (_, json) = send(&router, json_request("GET", "/apisix/admin/logs", "")).await;
        assert_eq!(json["total"], 0);
    }
}
