use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Route Table Schemas ---

/// ViewId
///
/// The renderable views of the roster front-end. The server never renders them,
/// it only names the one a navigation resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum ViewId {
    Password,
    StudentList,
    Team,
    TeamEdit,
    TeamNameEdit,
    NotFound,
}

/// RouteTarget
///
/// What a route leads to: a view, or another registered path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum RouteTarget {
    View { view: ViewId },
    Redirect { to: String },
}

/// RouteDescriptor
///
/// Static definition of a navigable path. Built once at startup from the route
/// list and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RouteDescriptor {
    /// Unique route name (e.g. "teams").
    pub name: String,
    /// Literal path, or the catch-all matcher `/:pathMatch(.*)*`.
    pub path: String,
    pub target: RouteTarget,
    /// Navigations to this route need an authenticated session.
    #[serde(default)]
    pub requires_auth: bool,
}

impl RouteDescriptor {
    pub fn view(name: &str, path: &str, view: ViewId) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            target: RouteTarget::View { view },
            requires_auth: false,
        }
    }

    pub fn redirect(name: &str, path: &str, to: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            target: RouteTarget::Redirect { to: to.to_string() },
            requires_auth: false,
        }
    }

    /// Marks the route as sensitive.
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// A catch-all path is a single dynamic segment with a `(.*)` matcher.
    pub fn is_catch_all(&self) -> bool {
        self.path.starts_with("/:") && self.path.contains("(.*)")
    }
}

// --- Navigation Schemas ---

/// Decision
///
/// The outcome of a guarded navigation. Exactly one of the two, always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
#[ts(export)]
pub enum Decision {
    Proceed,
    Redirect {
        /// Name of the login route.
        route: String,
        /// Path of the login route.
        path: String,
        /// Full path of the refused destination, handed to the login flow.
        redirect: String,
    },
}

impl Decision {
    /// Location header value for a `Redirect`: the login path with the refused
    /// destination under the `redirect` query parameter.
    pub fn location(&self) -> Option<String> {
        match self {
            Decision::Proceed => None,
            Decision::Redirect { path, redirect, .. } => Some(format!(
                "{}?redirect={}",
                path,
                urlencoding::encode(redirect)
            )),
        }
    }
}

/// ViewResponse
///
/// Body returned for a view path that passed the guard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ViewResponse {
    pub route: String,
    pub path: String,
    pub view: ViewId,
    /// The `redirect` query parameter, read by the login view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

// --- Session Schemas ---

/// SessionStatus
///
/// Output schema for GET /session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionStatus {
    pub authenticated: bool,
}

/// LoginRequest
///
/// Input payload for POST /session/login. `redirect` is whatever the login view
/// received in its `redirect` query parameter.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// LoginResponse
///
/// Output schema for a successful login. `redirect_to` is where the front-end
/// should navigate next.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub redirect_to: String,
}
