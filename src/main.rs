use roster_portal::{
    ApiClient, AppState,
    config::{AppConfig, Env},
    create_router,
    session::{FileStore, MemoryStore, StoreState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, opens the session store and serves the
/// router.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();

    // 2. Logging. RUST_LOG wins over the defaults below.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "roster_portal=debug,tower_http=info,axum=trace".into());

    // APP_ENV is read here too: the subscriber must exist before AppConfig::load logs.
    let production = std::env::var("APP_ENV").as_deref() == Ok("production");
    if production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    let config = AppConfig::load();
    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Session Store
    let store: StoreState = match &config.session_file {
        Some(path) => Arc::new(
            FileStore::open(path).expect("FATAL: Failed to open the session store. Check SESSION_FILE."),
        ),
        None => {
            tracing::warn!("SESSION_FILE not set, the session flag will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // 4. Upstream for the dev proxy
    let upstream = ApiClient::new(&config.proxy.target, config.api_timeout)
        .expect("FATAL: Failed to build the HTTP client. Check PROXY_TARGET.");
    if config.env == Env::Local {
        tracing::info!(
            prefix = %config.proxy.prefix,
            target = %upstream.base_url(),
            "Dev proxy enabled"
        );
    }

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config, store, Arc::new(upstream))
        .expect("FATAL: Route table is invalid. Check ROOT_REDIRECT and FALLBACK_REDIRECT.");

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the listen address. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
