use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod api_client;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod proxy;
pub mod route_table;
pub mod session;

// Routers segregated by how requests are treated (public, guarded views, dev proxy).
pub mod routes;
use routes::{dev_proxy, public, views};

// --- Public Re-exports ---

pub use api_client::{ApiClient, ApiError, MockUpstream, UpstreamState};
pub use config::{AppConfig, Env};
pub use guard::{AccessController, GuardState, NavigationAttempt};
pub use route_table::{RouteTable, RouteTableError, RouteTableState};
pub use session::{FileStore, MemoryStore, SessionState, StoreState, StoredSession};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
/// View paths are not listed: they are whatever the route table says.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::list_routes, handlers::session_status,
        handlers::login, handlers::logout
    ),
    components(
        schemas(
            models::RouteDescriptor, models::RouteTarget, models::ViewId, models::Decision,
            models::ViewResponse, models::SessionStatus, models::LoginRequest,
            models::LoginResponse,
        )
    ),
    tags(
        (name = "roster-portal", description = "Roster portal navigation and session API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request. The guard and the
/// session handlers see the same `StoredSession`.
#[derive(Clone)]
pub struct AppState {
    pub routes: RouteTableState,
    pub session: SessionState,
    pub guard: GuardState,
    /// Target of the dev proxy.
    pub upstream: UpstreamState,
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Builds the route table from `config.routing` and wires the access
    /// controller to a session backed by `store`.
    pub fn new(
        config: AppConfig,
        store: StoreState,
        upstream: UpstreamState,
    ) -> Result<Self, RouteTableError> {
        let routes = Arc::new(RouteTable::standard(&config.routing)?);
        let session = Arc::new(StoredSession::new(store));
        let guard = Arc::new(AccessController::new(routes.login(), session.clone()));

        Ok(Self {
            routes,
            session,
            guard,
            upstream,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RouteTableState {
    fn from_ref(app_state: &AppState) -> RouteTableState {
        app_state.routes.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.session.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the observability layers and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let mut base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes());

    // Dev proxy: local only, and only with a usable prefix.
    let prefix = state.config.proxy.prefix.trim_end_matches('/');
    if state.config.env == Env::Local {
        if prefix.starts_with('/') {
            base_router = base_router.merge(dev_proxy::dev_proxy_routes(prefix));
        } else {
            tracing::warn!(prefix = %state.config.proxy.prefix, "Proxy prefix unusable, dev proxy disabled");
        }
    }

    // View paths: everything else, behind the navigation guard.
    let base_router = base_router
        .merge(views::view_routes(state.clone()))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span, tagged with the `x-request-id` header so every
/// log line of one request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
