// ==========================================
// AUDIO ENDPOINT SERVER
// ==========================================
// Serves the locally hosted clips the LocalAudioPlayer streams from.
//
// Layers, outermost first:
// - TraceLayer: request logging
// - CORS allow-list: answers preflights before anything else runs
// - rate limiter: per-client sliding window
// - the streaming handler

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    routing::get,
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, ServerConfig};
use crate::error::{Error, Result};

pub mod audio;
pub mod error;
pub mod rate_limit;

pub use error::ApiError;
pub use rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub audio_dir: PathBuf,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(audio_dir: &Path, limiter: Arc<RateLimiter>) -> Self {
        // Canonical form so the containment check compares like with like
        let audio_dir = std::fs::canonicalize(audio_dir).unwrap_or_else(|e| {
            warn!("Audio directory {} is not accessible: {}", audio_dir.display(), e);
            audio_dir.to_path_buf()
        });
        AppState { audio_dir, limiter }
    }
}

pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let limiter = Arc::clone(&state.limiter);

    Router::new()
        .route(
            &config.audio_route,
            get(audio::stream_audio)
                .options(|| async { StatusCode::OK })
                .fallback(|| async { ApiError::MethodNotAllowed }),
        )
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::enforce_rate_limit,
        ))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH])
}

pub async fn run(config: Config) -> Result<()> {
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    let background = CancellationToken::new();
    limiter.spawn_sweeper(config.rate_limit.sweep_interval(), background.child_token());

    let state = AppState::new(&config.server.audio_dir, limiter);
    info!("Serving clips from {}", state.audio_dir.display());
    let app = create_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", config.server.bind_addr, e)))?;
    info!("Starting HTTP server on {}", config.server.bind_addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    background.cancel();
    served.map_err(|e| Error::Http(format!("Server error: {}", e)))?;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
