//! HTTP API: NOTAM Q&A plus the small demo endpoints the map client uses.

mod cors;
mod error;
mod handlers;

pub use error::ApiError;

use axum::{
    routing::{get, post},
    Router,
};
use skylens_core::AppConfig;
use skylens_knowledge::NotamService;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NotamService>,
    pub metar_provider: String,
    /// Allowed CORS origins; `*` accepts any
    pub allow_origins: Vec<String>,
}

impl AppState {
    pub fn new(service: Arc<NotamService>, config: &AppConfig) -> Self {
        Self {
            service,
            metar_provider: config.metar_provider.clone(),
            allow_origins: config.cors_origins(),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let cors = cors::cors_layer(&state.allow_origins);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ai/intent", post(handlers::intent))
        .route("/weather/metar", get(handlers::metar))
        .route("/flights/sample", get(handlers::sample_flight))
        .route("/ai/notam", get(handlers::notam))
        .with_state(state)
        .layer(cors)
}

/// Serve the API on `bind_addr` until Ctrl+C or SIGTERM.
///
/// In-flight requests complete before this returns.
pub async fn run(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Skylens API listening on {} (Ctrl+C/SIGTERM to stop)", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Skylens API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
