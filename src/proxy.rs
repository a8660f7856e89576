use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, header},
    response::Response,
};

use crate::{AppState, api_client::ForwardRequest, error::AppError};

/// Largest request body the dev proxy buffers before forwarding.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

// Connection-scoped headers that must not cross the proxy.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// rewrite_path
///
/// Strips the proxy prefix from the front of a request path, keeping the query.
/// `/api/students?year=2` becomes `/students?year=2` and a bare `/api` becomes `/`.
pub fn rewrite_path(prefix: &str, path_and_query: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let rest = path_and_query
        .strip_prefix(prefix)
        .unwrap_or(path_and_query);

    if rest.is_empty() {
        "/".to_string()
    } else if rest.starts_with('?') {
        format!("/{rest}")
    } else {
        rest.to_string()
    }
}

/// forwardable_headers
///
/// Request headers minus the hop-by-hop set and `Content-Length`. With
/// `change_origin` the `Host` header is dropped so the client sets the target's.
pub fn forwardable_headers(headers: &HeaderMap, change_origin: bool) -> HeaderMap {
    let mut forwarded = strip_hop_by_hop(headers);
    if change_origin {
        forwarded.remove(header::HOST);
    }
    forwarded
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut stripped = headers.clone();
    for name in HOP_BY_HOP.iter() {
        stripped.remove(name);
    }
    stripped.remove(header::CONTENT_LENGTH);
    stripped
}

/// forward
///
/// [Dev Route] Relays `/api/*` to the proxy target with the prefix rewritten.
/// Upstream error statuses pass through untouched; a timeout answers 504 and any
/// other transport failure 502.
pub async fn forward(State(state): State<AppState>, request: Request) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let original = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| parts.uri.path());
    let path_and_query = rewrite_path(&state.config.proxy.prefix, original);

    let body = body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::MalformedRequest(e.to_string()))?;

    tracing::debug!(method = %parts.method, from = %original, to = %path_and_query, "Proxying request");

    let upstream = state
        .upstream
        .forward(ForwardRequest {
            method: parts.method,
            path_and_query,
            headers: forwardable_headers(&parts.headers, state.config.proxy.change_origin),
            body,
        })
        .await?;

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = strip_hop_by_hop(&upstream.headers);
    Ok(response)
}
