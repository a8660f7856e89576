use std::{env, path::PathBuf, time::Duration};

/// Base URL of the remote roster API.
pub const DEFAULT_API_BASE_URL: &str = "https://paint-speckle-kumquat.glitch.me";

/// Request timeout applied by the API client, in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 5000;

/// Password accepted in `Env::Local` when `ACCESS_PASSWORD` is not set.
pub const LOCAL_ACCESS_PASSWORD: &str = "roster-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers through `FromRef`, like every other piece of `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls whether the dev proxy is mounted.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Remote roster API used by the HTTP client.
    pub api_base_url: String,
    pub api_timeout: Duration,
    // Dev-time path-rewriting proxy.
    pub proxy: ProxyConfig,
    // Shared password checked by the login flow.
    pub access_password: String,
    // Where the session flag is persisted. `None` keeps it in memory.
    pub session_file: Option<PathBuf>,
    // Route table policy (root redirect, catch-all behaviour, login route).
    pub routing: RoutingPolicy,
}

/// Env
///
/// Defines the runtime context. `Local` enables development conveniences such as
/// the `/api` proxy and the fallback password.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ProxyConfig
///
/// Requests under `prefix` are forwarded to `target` with the prefix stripped.
#[derive(Clone, Debug, PartialEq)]
pub struct ProxyConfig {
    pub prefix: String,
    pub target: String,
    /// Replace the `Host` header with the target's host.
    pub change_origin: bool,
}

/// FallbackPolicy
///
/// What the catch-all route does with a path no other route claims.
#[derive(Clone, Debug, PartialEq)]
pub enum FallbackPolicy {
    /// Render the not-found view.
    NotFound,
    /// Redirect to the given registered path.
    Redirect(String),
}

/// RoutingPolicy
///
/// The configurable parts of the static route table.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutingPolicy {
    /// Target of the `/` redirect record.
    pub root_redirect: String,
    pub fallback: FallbackPolicy,
    /// Name of the route unauthenticated navigations are sent to.
    pub login_route: String,
    /// Where a successful login goes when no usable redirect was carried.
    pub post_login_redirect: String,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            root_redirect: "/password".to_string(),
            fallback: FallbackPolicy::NotFound,
            login_route: "password".to_string(),
            post_login_redirect: "/students".to_string(),
        }
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for test state setup. Nothing here reads
    /// the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout: Duration::from_millis(DEFAULT_API_TIMEOUT_MS),
            proxy: ProxyConfig {
                prefix: "/api".to_string(),
                target: DEFAULT_API_BASE_URL.to_string(),
                change_origin: true,
            },
            access_password: LOCAL_ACCESS_PASSWORD.to_string(),
            session_file: None,
            routing: RoutingPolicy::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics when `ACCESS_PASSWORD` is missing in production, or when a numeric or
    /// boolean variable cannot be parsed. The server must not start half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let access_password = match env {
            Env::Production => env::var("ACCESS_PASSWORD")
                .expect("FATAL: ACCESS_PASSWORD must be set in production."),
            Env::Local => env::var("ACCESS_PASSWORD").unwrap_or_else(|_| {
                tracing::warn!("ACCESS_PASSWORD not set, using the local development password");
                LOCAL_ACCESS_PASSWORD.to_string()
            }),
        };

        let api_base_url = var_or("API_BASE_URL", DEFAULT_API_BASE_URL);
        let api_timeout_ms: u64 = env::var("API_TIMEOUT_MS")
            .map(|raw| {
                raw.parse()
                    .expect("FATAL: API_TIMEOUT_MS must be a whole number of milliseconds.")
            })
            .unwrap_or(DEFAULT_API_TIMEOUT_MS);

        let proxy = ProxyConfig {
            prefix: var_or("PROXY_PREFIX", "/api"),
            target: var_or("PROXY_TARGET", &api_base_url),
            change_origin: env::var("PROXY_CHANGE_ORIGIN")
                .map(|raw| parse_bool(&raw).expect("FATAL: PROXY_CHANGE_ORIGIN must be true or false."))
                .unwrap_or(true),
        };

        let defaults = RoutingPolicy::default();
        let routing = RoutingPolicy {
            root_redirect: var_or("ROOT_REDIRECT", &defaults.root_redirect),
            fallback: match env::var("FALLBACK_REDIRECT") {
                Ok(target) if !target.is_empty() => FallbackPolicy::Redirect(target),
                _ => FallbackPolicy::NotFound,
            },
            login_route: defaults.login_route,
            post_login_redirect: var_or("POST_LOGIN_REDIRECT", &defaults.post_login_redirect),
        };

        Self {
            env,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000"),
            api_base_url,
            api_timeout: Duration::from_millis(api_timeout_ms),
            proxy,
            access_password,
            session_file: env::var("SESSION_FILE").ok().map(PathBuf::from),
            routing,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
