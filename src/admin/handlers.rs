use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::error::{ApiError, ApiResult};
use crate::admin::AdminState;
use crate::observability::ScriptLogEntry;
use crate::route::{RouteRecord, RouteWrite};
use crate::runtime::WorkerStatus;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub store_revision: u64,
    pub workers: Vec<WorkerStatus>,
}

#[derive(Serialize)]
pub struct RouteList {
    pub total: usize,
    pub list: Vec<RouteRecord>,
}

#[derive(Serialize)]
pub struct LogList {
    pub total: usize,
    pub entries: Vec<ScriptLogEntry>,
}

/// Write options. With `settle=true` the response waits (bounded) until
/// every worker has applied the write.
#[derive(Debug, Default, Deserialize)]
pub struct WriteQuery {
    #[serde(default)]
    pub settle: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub format: Option<String>,
}

fn parse_write(body: &Bytes) -> ApiResult<RouteWrite> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid route body: {}", e)))
}

async fn settle(state: &AdminState, query: &WriteQuery, revision: u64) {
    if query.settle && !state.pool.wait_for_revision(revision, state.settle_timeout).await {
        tracing::warn!(revision, timeout = ?state.settle_timeout, "Workers did not settle in time");
    }
}

pub async fn create_route(
    State(state): State<AdminState>,
    Query(query): Query<WriteQuery>,
    body: Bytes,
) -> ApiResult<Json<RouteRecord>> {
    let record = state.service.create(parse_write(&body)?)?;
    settle(&state, &query, record.revision).await;
    Ok(Json(record))
}

pub async fn put_route(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Query(query): Query<WriteQuery>,
    body: Bytes,
) -> ApiResult<Json<RouteRecord>> {
    let record = state.service.put(&id, parse_write(&body)?)?;
    settle(&state, &query, record.revision).await;
    Ok(Json(record))
}

pub async fn get_route(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RouteRecord>> {
    Ok(Json(state.service.get(&id)?))
}

pub async fn list_routes(State(state): State<AdminState>) -> ApiResult<Json<RouteList>> {
    let list = state.service.list()?;
    Ok(Json(RouteList {
        total: list.len(),
        list,
    }))
}

pub async fn delete_route(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Query(query): Query<WriteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let revision = state.service.delete(&id)?;
    settle(&state, &query, revision).await;
    Ok(Json(serde_json::json!({ "deleted": id, "revision": revision })))
}

pub async fn get_logs(State(state): State<AdminState>, Query(query): Query<LogQuery>) -> Response {
    if query.format.as_deref() == Some("text") {
        return (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            state.log.render(),
        )
            .into_response();
    }

    let entries = state.log.entries();
    Json(LogList {
        total: entries.len(),
        entries,
    })
    .into_response()
}

pub async fn clear_logs(State(state): State<AdminState>) -> Json<serde_json::Value> {
    let cleared = state.log.clear();
    tracing::info!(cleared, "Script log cleared");
    Json(serde_json::json!({ "cleared": cleared }))
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        store_revision: state.service.store().revision(),
        workers: state.pool.status(),
    })
}
