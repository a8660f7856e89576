use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without passing the navigation guard. The session
/// endpoints are the only writers of the session flag.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // GET /routes
        // The static route table, including each route's `requires_auth` marker.
        .route("/routes", get(handlers::list_routes))
        // GET /session
        .route("/session", get(handlers::session_status))
        // POST /session/login
        // Checks the shared password, sets the flag and tells the client where to go.
        .route("/session/login", post(handlers::login))
        // POST /session/logout
        .route("/session/logout", post(handlers::logout))
}
