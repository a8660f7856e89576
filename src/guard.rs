use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    AppState,
    models::{Decision, RouteDescriptor, ViewResponse},
    route_table::Resolution,
    session::SessionFlag,
};

/// NavigationAttempt
///
/// A single request to move the UI to `destination`. Lives for one request.
#[derive(Debug, Clone)]
pub struct NavigationAttempt<'a> {
    pub destination: &'a RouteDescriptor,
    /// Path plus query string, exactly as requested.
    pub full_path: String,
    /// The route the user came from. Absent on initial load.
    pub origin: Option<&'a RouteDescriptor>,
    /// Value of the `redirect` query parameter, if any.
    pub redirect: Option<String>,
}

/// AccessController
///
/// Gates navigation attempts on the destination's `requires_auth` marker and the
/// session flag. Reads the flag, never writes it.
pub struct AccessController {
    login: RouteDescriptor,
    session: Arc<dyn SessionFlag>,
}

/// GuardState
///
/// The shared handle used across the application state.
pub type GuardState = Arc<AccessController>;

impl AccessController {
    pub fn new(login: &RouteDescriptor, session: Arc<dyn SessionFlag>) -> Self {
        Self {
            login: login.clone(),
            session,
        }
    }

    /// decide
    ///
    /// Total and side-effect free: sensitive destinations without an authenticated
    /// session go to the login route carrying the full destination path, every
    /// other attempt proceeds.
    pub fn decide(&self, attempt: &NavigationAttempt<'_>) -> Decision {
        if !attempt.destination.requires_auth || self.session.is_authenticated() {
            return Decision::Proceed;
        }

        Decision::Redirect {
            route: self.login.name.clone(),
            path: self.login.path.clone(),
            redirect: attempt.full_path.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RedirectParam {
    redirect: Option<String>,
}

/// navigation_guard
///
/// Middleware in front of every view path. Redirect records answer `302 Found`
/// to their target, refused attempts answer `302 Found` to the login route, and
/// admitted attempts continue to the view handler with a `ViewResponse` in the
/// request extensions.
pub async fn navigation_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().clone();
    let full_path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let (destination, view) = match state.routes.resolve(uri.path()) {
        Resolution::Redirect { descriptor, to } => {
            // The query carries over unless the target brings its own.
            let location = match uri.query() {
                Some(query) if !to.contains('?') => format!("{to}?{query}"),
                _ => to,
            };
            tracing::debug!(route = %descriptor.name, from = %full_path, to = %location, "Route redirect");
            return found(&location);
        }
        Resolution::View { descriptor, view } => (descriptor, view),
    };

    let origin = request
        .headers()
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Uri>().ok())
        .map(|referer| state.routes.match_path(referer.path()));

    let redirect = Query::<RedirectParam>::try_from_uri(&uri)
        .ok()
        .and_then(|Query(param)| param.redirect);

    let attempt = NavigationAttempt {
        destination,
        full_path,
        origin,
        redirect,
    };

    let decision = state.guard.decide(&attempt);
    match &decision {
        Decision::Proceed => {
            tracing::debug!(
                route = %destination.name,
                from = attempt.origin.map(|route| route.name.as_str()).unwrap_or("-"),
                "Navigation admitted"
            );
            request.extensions_mut().insert(ViewResponse {
                route: destination.name.clone(),
                path: attempt.full_path.clone(),
                view,
                redirect: attempt.redirect.clone(),
            });
            next.run(request).await
        }
        Decision::Redirect { route, redirect, .. } => {
            tracing::info!(destination = %redirect, login = %route, "Unauthenticated navigation redirected");
            // A Redirect decision always carries a location.
            let location = decision.location().unwrap_or_default();
            found(&location)
        }
    }
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
