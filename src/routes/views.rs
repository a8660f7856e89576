use crate::{AppState, guard::navigation_guard, handlers};
use axum::{Router, middleware, routing::get};

/// View Router Module
///
/// Catches every path not claimed by another router. Each request is a
/// navigation attempt: `navigation_guard` resolves it against the route table
/// and either redirects or lets `render_view` answer.
pub fn view_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .fallback(get(handlers::render_view))
        .layer(middleware::from_fn_with_state(state, navigation_guard))
}
