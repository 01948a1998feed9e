//! HTTP API.
//!
//! One shared read-only resource: the loaded engine behind an `Arc`. Requests
//! never mutate it, so no locking is needed.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{CorsOrigins, ServeConfig};
use crate::error::AppError;
use crate::io::BatchLimits;
use crate::model::PredictionEngine;

pub mod error;
pub mod handlers;

/// Slack for multipart boundaries and part headers on top of the file limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PredictionEngine>,
    pub limits: BatchLimits,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<PredictionEngine>, limits: BatchLimits) -> Self {
        Self {
            engine,
            limits,
            started_at: Instant::now(),
        }
    }
}

/// Build the router with CORS, tracing and the upload body limit applied.
pub fn router(state: AppState, cors: &CorsOrigins) -> Router {
    let body_limit = state.limits.max_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/predict", post(handlers::predict))
        .route("/api/predict/bulk", post(handlers::predict_bulk))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::any(),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServeConfig, engine: Arc<PredictionEngine>) -> Result<(), AppError> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::io(format!("Failed to bind {addr}: {e}")))?;

    let app = router(AppState::new(engine, config.limits), &config.cors_origins);
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::io(format!("Server error: {e}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
