use crate::{AppState, proxy};
use axum::{Router, routing::any};

/// Dev Proxy Router Module
///
/// Forwards `<prefix>` and everything below it to the proxy target, any method.
pub fn dev_proxy_routes(prefix: &str) -> Router<AppState> {
    let prefix = prefix.trim_end_matches('/');
    Router::new()
        .route(prefix, any(proxy::forward))
        .route(&format!("{prefix}/{{*path}}"), any(proxy::forward))
}
