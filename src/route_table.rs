use std::{collections::HashSet, sync::Arc};

use thiserror::Error;

use crate::{
    config::{FallbackPolicy, RoutingPolicy},
    models::{RouteDescriptor, RouteTarget, ViewId},
};

/// Matcher used by the catch-all route.
pub const CATCH_ALL_PATH: &str = "/:pathMatch(.*)*";

/// RouteTableError
///
/// Reasons a route list is refused at startup. A table that builds is guaranteed
/// to resolve every path without looping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("duplicate route name `{0}`")]
    DuplicateName(String),

    #[error("duplicate route path `{0}`")]
    DuplicatePath(String),

    #[error("login route `{0}` is not registered")]
    MissingLoginRoute(String),

    #[error("login route `{0}` must render a view and must not require authentication")]
    InvalidLoginRoute(String),

    #[error("no catch-all route registered")]
    MissingCatchAll,

    #[error("more than one catch-all route registered")]
    MultipleCatchAll,

    #[error("catch-all route `{0}` must not require authentication")]
    SensitiveCatchAll(String),

    #[error("route `{route}` redirects to unregistered path `{to}`")]
    UnknownRedirectTarget { route: String, to: String },

    #[error("redirect loop through route `{0}`")]
    RedirectLoop(String),
}

/// Resolution
///
/// Where a requested path leads once the table has been consulted.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    View {
        descriptor: &'a RouteDescriptor,
        view: ViewId,
    },
    Redirect {
        descriptor: &'a RouteDescriptor,
        to: String,
    },
}

/// RouteTable
///
/// The ordered, immutable list of route descriptors with its designated login and
/// catch-all routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    login: usize,
    catch_all: usize,
}

/// RouteTableState
///
/// The shared handle stored in `AppState`.
pub type RouteTableState = Arc<RouteTable>;

impl RouteTable {
    /// new
    ///
    /// Validates `routes` and designates `login_route` (by name) as the target of
    /// refused navigations.
    pub fn new(routes: Vec<RouteDescriptor>, login_route: &str) -> Result<Self, RouteTableError> {
        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        let mut catch_all = None;

        for (index, route) in routes.iter().enumerate() {
            if !names.insert(route.name.as_str()) {
                return Err(RouteTableError::DuplicateName(route.name.clone()));
            }
            if route.is_catch_all() {
                if catch_all.replace(index).is_some() {
                    return Err(RouteTableError::MultipleCatchAll);
                }
                if route.requires_auth {
                    return Err(RouteTableError::SensitiveCatchAll(route.name.clone()));
                }
                continue;
            }
            if !paths.insert(normalize_path(&route.path).to_ascii_lowercase()) {
                return Err(RouteTableError::DuplicatePath(route.path.clone()));
            }
        }

        let catch_all = catch_all.ok_or(RouteTableError::MissingCatchAll)?;
        let login = routes
            .iter()
            .position(|route| route.name == login_route)
            .ok_or_else(|| RouteTableError::MissingLoginRoute(login_route.to_string()))?;

        let login_descriptor = &routes[login];
        let renders_view = matches!(login_descriptor.target, RouteTarget::View { .. });
        if login == catch_all || login_descriptor.requires_auth || !renders_view {
            return Err(RouteTableError::InvalidLoginRoute(login_route.to_string()));
        }

        let table = Self {
            routes,
            login,
            catch_all,
        };
        table.check_redirects()?;
        Ok(table)
    }

    /// standard
    ///
    /// The roster application's route list, with the root redirect and catch-all
    /// behaviour taken from `policy`.
    pub fn standard(policy: &RoutingPolicy) -> Result<Self, RouteTableError> {
        let fallback = match &policy.fallback {
            FallbackPolicy::NotFound => {
                RouteDescriptor::view("not-found", CATCH_ALL_PATH, ViewId::NotFound)
            }
            FallbackPolicy::Redirect(to) => RouteDescriptor::redirect("not-found", CATCH_ALL_PATH, to),
        };

        let routes = vec![
            RouteDescriptor::redirect("root", "/", &policy.root_redirect),
            RouteDescriptor::view("password", "/password", ViewId::Password),
            RouteDescriptor::view("students", "/students", ViewId::StudentList).requires_auth(),
            RouteDescriptor::view("teams", "/teams", ViewId::Team).requires_auth(),
            RouteDescriptor::view("team-edit", "/teams/edit", ViewId::TeamEdit).requires_auth(),
            RouteDescriptor::view("team-name-edit", "/teams/name-edit", ViewId::TeamNameEdit)
                .requires_auth(),
            fallback,
        ];

        Self::new(routes, &policy.login_route)
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn login(&self) -> &RouteDescriptor {
        &self.routes[self.login]
    }

    pub fn catch_all(&self) -> &RouteDescriptor {
        &self.routes[self.catch_all]
    }

    pub fn get(&self, name: &str) -> Option<&RouteDescriptor> {
        self.routes.iter().find(|route| route.name == name)
    }

    /// match_path
    ///
    /// Returns the descriptor claiming `path`. Literal routes win; anything else
    /// lands on the catch-all, so this never fails.
    pub fn match_path(&self, path: &str) -> &RouteDescriptor {
        self.find_literal(path).unwrap_or_else(|| self.catch_all())
    }

    /// resolve
    ///
    /// Matches `path` and reports whether it renders a view or is a redirect record.
    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        let descriptor = self.match_path(path);
        match &descriptor.target {
            RouteTarget::View { view } => Resolution::View {
                descriptor,
                view: *view,
            },
            RouteTarget::Redirect { to } => Resolution::Redirect {
                descriptor,
                to: to.clone(),
            },
        }
    }

    fn find_literal(&self, path: &str) -> Option<&RouteDescriptor> {
        let wanted = normalize_path(path);
        self.routes
            .iter()
            .filter(|route| !route.is_catch_all())
            .find(|route| normalize_path(&route.path).eq_ignore_ascii_case(wanted))
    }

    // Every redirect must land on a literal route, and following redirects must end
    // on a view.
    fn check_redirects(&self) -> Result<(), RouteTableError> {
        for start in &self.routes {
            let mut seen = HashSet::new();
            let mut current = start;

            while let RouteTarget::Redirect { to } = &current.target {
                if !seen.insert(current.name.as_str()) {
                    return Err(RouteTableError::RedirectLoop(start.name.clone()));
                }
                current = self.find_literal(to).ok_or_else(|| {
                    RouteTableError::UnknownRedirectTarget {
                        route: current.name.clone(),
                        to: to.clone(),
                    }
                })?;
            }
        }
        Ok(())
    }
}

/// normalize_path
///
/// Drops the query string, the fragment and any trailing slash. The root path
/// stays `/`.
pub fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
