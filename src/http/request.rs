//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Apply script-set headers to the upstream request
//! - Point the request URI at the chosen upstream node
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Invalid header names or values from scripts are skipped, not fatal
//! - Path and query are forwarded unchanged

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::uri::{Authority, Scheme};
use axum::http::{HeaderMap, Uri};
use std::str::FromStr;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Insert script-set headers, replacing existing values. Returns how many
/// were applied.
pub fn apply_headers(headers: &mut HeaderMap, pending: Vec<(String, String)>) -> usize {
    let mut applied = 0;
    for (name, value) in pending {
        match (HeaderName::from_str(&name), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
                applied += 1;
            }
            _ => tracing::warn!(header = %name, "Script set an invalid header, skipped"),
        }
    }
    applied
}

/// Rewrite `uri` to target `node` (`host:port`) over plain HTTP.
pub fn upstream_uri(uri: &Uri, node: &str) -> Result<Uri, axum::http::Error> {
    let mut parts = uri.clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(Authority::from_str(node)?);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some("/".parse()?);
    }
    Ok(Uri::from_parts(parts)?)
}
