//! Main proxy server implementation

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handler;
use crate::config::AppConfig;
use crate::upstream::{BiliClient, UpstreamError};

/// Shared state for the proxy
///
/// Everything in here is built once at start-up and only read afterwards.
#[derive(Clone)]
pub struct ProxyState {
    pub client: BiliClient,
}

impl ProxyState {
    pub fn new(config: &AppConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: BiliClient::new(&config.upstream)?,
        })
    }
}

/// Build the router: API routes, health check, and the static front-end as fallback
pub fn build_router(state: ProxyState, static_dir: &str) -> Router {
    Router::new()
        .route("/health", get(handler::health))
        .route("/api/view", get(handler::video_info))
        .route("/api/dm", get(handler::danmaku))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the proxy server until Ctrl-C / SIGTERM
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = ProxyState::new(&config)?;
    let app = build_router(state, &config.server.static_dir);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    let addr = listener.local_addr()?;

    tracing::info!("bili-proxy listening on {}", addr);
    tracing::info!(
        view_url = %config.upstream.view_url,
        comment_base_url = %config.upstream.comment_base(),
        timeout_seconds = config.upstream.timeout_seconds,
        "Proxying to bilibili"
    );
    if !std::path::Path::new(&config.server.static_dir).is_dir() {
        tracing::warn!(
            static_dir = %config.server.static_dir,
            "Static directory does not exist, only API routes will respond"
        );
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
