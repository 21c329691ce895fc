//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{http::HeaderMap, routing::any, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use route_gateway::config::GatewayConfig;
use route_gateway::lifecycle::{self, RunningGateway};

pub const UPSTREAM_BODY: &str = "hello world\n";

/// Start a mock upstream that answers every request with `UPSTREAM_BODY`.
/// The value of the request's `x-from-script` header is echoed back in
/// `x-upstream-saw`, so tests can see what the gateway forwarded.
pub async fn start_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(any(|headers: HeaderMap| async move {
        let saw = headers
            .get("x-from-script")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        ([("x-upstream-saw", saw)], UPSTREAM_BODY)
    }));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Config with ephemeral ports and a quick settle bound.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.workers = 2;
    config.admin.bind_address = "127.0.0.1:0".into();
    config.propagation.settle_timeout_ms = 2_000;
    config
}

pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    lifecycle::start(config).await.expect("gateway should start")
}

/// Route body in the admin API's JSON shape.
pub fn route_body(upstream: SocketAddr, script: Option<&str>) -> Value {
    let mut body = json!({
        "name": "route1",
        "uri": "/hello",
        "upstream": {
            "type": "roundrobin",
            "nodes": { upstream.to_string(): 1 }
        }
    });
    if let Some(script) = script {
        body["script"] = json!(script);
    }
    body
}

/// Thin admin API client. Writes ask the gateway to settle before answering.
pub struct Admin {
    base: String,
    key: Option<String>,
    client: reqwest::Client,
}

impl Admin {
    pub fn new(gateway: &RunningGateway) -> Self {
        Self::with_key(gateway, None)
    }

    pub fn with_key(gateway: &RunningGateway, key: Option<&str>) -> Self {
        let addr = gateway.admin_addr.expect("admin API enabled");
        Self {
            base: format!("http://{}/apisix/admin", addr),
            key: key.map(str::to_string),
            client: client(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base, path));
        match &self.key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(builder: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let res = builder.send().await.expect("admin API unreachable");
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn put_route(&self, id: &str, body: &Value) -> (StatusCode, Value) {
        Self::send(
            self.request(reqwest::Method::PUT, &format!("/routes/{}?settle=true", id))
                .json(body),
        )
        .await
    }

    pub async fn post_route(&self, body: &Value) -> (StatusCode, Value) {
        Self::send(self.request(reqwest::Method::POST, "/routes?settle=true").json(body)).await
    }

    pub async fn get_route(&self, id: &str) -> (StatusCode, Value) {
        Self::send(self.request(reqwest::Method::GET, &format!("/routes/{}", id))).await
    }

    pub async fn list_routes(&self) -> (StatusCode, Value) {
        Self::send(self.request(reqwest::Method::GET, "/routes")).await
    }

    pub async fn delete_route(&self, id: &str) -> (StatusCode, Value) {
        Self::send(self.request(reqwest::Method::DELETE, &format!("/routes/{}?settle=true", id))).await
    }

    pub async fn status(&self) -> (StatusCode, Value) {
        Self::send(self.request(reqwest::Method::GET, "/status")).await
    }

    /// Script log rendered as text, one line per entry.
    pub async fn logs_text(&self) -> String {
        self.request(reqwest::Method::GET, "/logs?format=text")
            .send()
            .await
            .expect("admin API unreachable")
            .text()
            .await
            .unwrap()
    }

    pub async fn clear_logs(&self) -> (StatusCode, Value) {
        Self::send(self.request(reqwest::Method::DELETE, "/logs")).await
    }
}

/// Client without pooling so a stopped gateway never serves a stale socket.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// GET `path` on the gateway's data plane.
pub async fn hit(gateway: &RunningGateway, path: &str) -> reqwest::Response {
    client()
        .get(format!("http://{}{}", gateway.gateway_addr, path))
        .send()
        .await
        .expect("gateway unreachable")
}
