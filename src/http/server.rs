//! Gateway data-plane HTTP server.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all gateway handler
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Dispatch requests to a worker and its route table
//! - Run script phases around the upstream call
//! - Forward requests to upstream nodes
//! - Observability (metrics, correlation IDs)

use axum::{
    body::Body,
    extract::State,
    http::{request::Parts, Request, Version},
    response::Response,
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::http::request::{apply_headers, request_id, upstream_uri};
use crate::http::response;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::runtime::{GatewayWorker, RouteEntry, WorkerPool};
use crate::script::{CompiledScript, Phase, ScriptContext};

/// State injected into the gateway handler.
#[derive(Clone)]
pub struct GatewayState {
    pub pool: Arc<WorkerPool>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for routed traffic.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(pool: Arc<WorkerPool>, config: &ListenerConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = GatewayState { pool, client };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: GatewayState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Match the route, run its script phases, proxy upstream.
async fn gateway_handler(State(state): State<GatewayState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let worker = state.pool.pick().clone();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers());

    let Some(entry) = worker.table().match_path(&path) else {
        tracing::debug!(request_id = %request_id, method = %method, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, "none", start);
        return response::route_not_found();
    };

    // One artifact for the whole request, even if a newer one is swapped in.
    let script = entry.script();
    let (mut parts, body) = request.into_parts();
    let ctx = ScriptContext::new(
        entry.id(),
        method.clone(),
        path.clone(),
        parts.headers.clone(),
        worker.log().clone(),
    );

    tracing::debug!(
        request_id = %request_id,
        route_id = %entry.id(),
        worker = worker.index(),
        script_revision = script.as_ref().map(|s| s.revision),
        "Routing request"
    );

    let exited = match &script {
        Some(script) => run_request_phases(&worker, script, &ctx).await,
        None => None,
    };

    let mut response = match exited {
        Some(response) => response,
        None => {
            apply_headers(&mut parts.headers, ctx.take_pending_headers());
            forward(&state, &entry, parts, body, &request_id).await
        }
    };

    if let Some(script) = &script {
        ctx.set_upstream_status(response.status().as_u16());
        let _ = worker.run_phase(script, Phase::HeaderFilter, &ctx).await;
        apply_headers(response.headers_mut(), ctx.take_pending_headers());
        let _ = worker.run_phase(script, Phase::Log, &ctx).await;
    }

    metrics::record_request(method.as_str(), response.status().as_u16(), entry.id(), start);
    response
}

/// Run `rewrite` and `access`. Returns the script's exit response, if any.
async fn run_request_phases(
    worker: &GatewayWorker,
    script: &Arc<CompiledScript>,
    ctx: &ScriptContext,
) -> Option<Response> {
    for phase in [Phase::Rewrite, Phase::Access] {
        // Faults are already logged and counted; the phase acts as a no-op.
        let _ = worker.run_phase(script, phase, ctx).await;
        if let Some(exit) = ctx.exit_response() {
            tracing::debug!(route_id = %script.route_id, phase = %phase, status = exit.status, "Script exited early");
            return Some(response::script_exit(exit));
        }
    }
    None
}

async fn forward(
    state: &GatewayState,
    entry: &RouteEntry,
    mut parts: Parts,
    body: Body,
    request_id: &str,
) -> Response {
    let Some(node) = entry.balancer.next_node() else {
        tracing::warn!(request_id = %request_id, route_id = %entry.id(), "Route has no upstream nodes");
        return response::no_upstream();
    };

    parts.uri = match upstream_uri(&parts.uri, node) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, node = %node, error = %e, "Invalid upstream node");
            return response::bad_gateway();
        }
    };
    parts.version = Version::HTTP_11;

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(upstream) => {
            let (parts, body) = upstream.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, route_id = %entry.id(), node = %node, error = %e, "Upstream error");
            response::bad_gateway()
        }
    }
}
