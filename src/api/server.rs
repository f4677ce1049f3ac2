//! HTTP server lifecycle

use anyhow::{Context, Result};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::HttpConfig;

use super::routes::{self, AppState};

/// Bind the API listener and serve until the shutdown signal fires.
pub async fn serve(
    config: &HttpConfig,
    state: AppState,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
) -> Result<()> {
    let mut app = routes::router(state).layer(TraceLayer::new_for_http());
    if config.cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "http api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("http api shutting down");
        })
        .await
        .context("http server error")?;

    Ok(())
}
