use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};

use crate::{
    AppState,
    error::AppError,
    models::{LoginRequest, LoginResponse, RouteDescriptor, SessionStatus, ViewResponse},
    session::{SessionFlag, SessionState, StoreError},
};

// --- Handlers ---

/// health
///
/// [Public Route] Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// list_routes
///
/// [Public Route] The route table, so the front-end router can be built from the
/// same list the guard enforces.
#[utoipa::path(
    get,
    path = "/routes",
    responses((status = 200, description = "Route table", body = [RouteDescriptor]))
)]
pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<RouteDescriptor>> {
    Json(state.routes.routes().to_vec())
}

/// session_status
///
/// [Public Route] Reports the current value of the session flag.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Session flag", body = SessionStatus))
)]
pub async fn session_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(SessionStatus {
        authenticated: state.session.is_authenticated(),
    })
}

/// login
///
/// [Public Route] Checks the shared password and sets the session flag. The
/// carried `redirect` is honoured only when it is a local absolute path.
#[utoipa::path(
    post,
    path = "/session/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.password != state.config.access_password {
        tracing::warn!("Login attempt with a wrong password");
        return Err(AppError::InvalidPassword);
    }

    run_blocking(state.session.clone(), |session| session.login()).await?;

    let redirect_to = payload
        .redirect
        .filter(|target| is_local_path(target))
        .unwrap_or_else(|| state.config.routing.post_login_redirect.clone());

    Ok(Json(LoginResponse {
        authenticated: true,
        redirect_to,
    }))
}

/// logout
///
/// [Public Route] Clears the session flag. Idempotent.
#[utoipa::path(
    post,
    path = "/session/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    run_blocking(state.session.clone(), |session| session.logout()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// render_view
///
/// [Guarded Route] Names the view a navigation resolved to. Only reachable
/// through `navigation_guard`, which supplies the `ViewResponse`.
pub async fn render_view(Extension(view): Extension<ViewResponse>) -> Json<ViewResponse> {
    Json(view)
}

// Session writes may hit the disk, so they stay off the async workers.
async fn run_blocking<F>(session: SessionState, write: F) -> Result<(), AppError>
where
    F: FnOnce(&SessionState) -> Result<(), StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || write(&session))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(())
}

/// is_local_path
///
/// True for absolute paths on this origin. Rejects protocol-relative (`//host`)
/// and backslash tricks (`/\host`) that browsers treat as another origin, and
/// any control character or whitespace: browsers strip tab, CR and LF before
/// parsing, which turns `/<tab>/host` into `//host`.
pub fn is_local_path(target: &str) -> bool {
    if target.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return false;
    }
    target.starts_with('/') && !target.starts_with("//") && !target.starts_with("/\\")
}
