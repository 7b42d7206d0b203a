use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rankvote::{
    api,
    auth::TokenKeys,
    config::Config,
    state::AppState,
    store::{spawn_expiry_sweeper, MemoryStore},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rankvote=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting rankvote...");

    let config = Config::from_env();

    let store = Arc::new(MemoryStore::new(config.poll_duration));
    spawn_expiry_sweeper(store.clone(), config.sweep_interval);

    let keys = TokenKeys::new(&config.jwt_secret, config.poll_duration);
    let state = Arc::new(AppState::new(store, keys));

    let app = api::router(state);

    let addr: SocketAddr = match format!("{}:{}", config.bind_address, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address {}: {}", config.bind_address, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
