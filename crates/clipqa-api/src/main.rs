//! Reviewer API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipqa_api::{create_router, metrics, ApiConfig, AppState, StoreBackend};
use clipqa_store::{MemoryStore, PgStore, RecordStore, StoreConfig, StoreResult};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    init_tracing();

    info!("Starting clipqa-api");

    let config = ApiConfig::from_env();
    info!(
        "API config: host={}, port={}, store={:?}, lock_timeout={}s",
        config.host, config.port, config.store_backend, config.lock_timeout_secs
    );

    if config.jwt_secret.is_empty() {
        error!("AUTH_JWT_SECRET must be set");
        std::process::exit(1);
    }

    let store = match open_store(config.store_backend).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open record store: {}", e);
            std::process::exit(1);
        }
    };

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_router(AppState::new(config, store), metrics_handle);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clipqa=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn open_store(backend: StoreBackend) -> StoreResult<Arc<dyn RecordStore>> {
    match backend {
        StoreBackend::Memory => {
            warn!("Using in-process store; reviews are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(&StoreConfig::from_env()?).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
