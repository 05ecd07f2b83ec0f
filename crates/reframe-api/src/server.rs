//! HTTP entry adapter
//!
//! Feeds each incoming request through the pipeline and serves the outcome:
//! success codes return the artifact bytes, everything else returns a 404
//! page embedding the pipeline result for debugging.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::trace::TraceLayer;

use reframe_core::Config;
use reframe_pipeline::{ImagePipeline, PipelineResult};

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ImagePipeline>,
}

/// Start the server with graceful shutdown
pub async fn start_server(config: &Config, pipeline: Arc<ImagePipeline>) -> anyhow::Result<()> {
    let state = AppState { pipeline };

    let app = Router::new()
        .fallback(proxy_image)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Every path is an image request; the pipeline decides what it means.
async fn proxy_image(State(state): State<AppState>, uri: Uri) -> Response {
    let request_url = match uri.query() {
        Some(query) => format!("{}?{}", uri.path(), query),
        None => uri.path().to_string(),
    };

    let result = state.pipeline.run(&request_url).await;

    if result.code.is_success() {
        if let Some(payload) = &result.payload {
            let content_type = payload
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string());
            return (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    // Artifacts are immutable under their cache key
                    (
                        header::CACHE_CONTROL,
                        "public, max-age=31536000".to_string(),
                    ),
                ],
                payload.body.clone(),
            )
                .into_response();
        }
    }

    not_found(&result)
}

/// 404 page with the serialized pipeline result for debugging.
fn not_found(result: &PipelineResult) -> Response {
    let dump = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.code.to_string());
    let body = format!("<h1>Not found!</h1><xmp>{}</xmp>", dump);

    (
        StatusCode::NOT_FOUND,
        [
            (header::CONTENT_TYPE, "text/html".to_string()),
            (header::CACHE_CONTROL, "public, max-age=10".to_string()),
        ],
        body,
    )
        .into_response()
}

/// Signal handler for graceful shutdown
///
/// Listens for Ctrl+C (SIGINT) and SIGTERM signals to initiate graceful shutdown.
///
/// # Panics
/// Panics if a signal handler cannot be installed (unrecoverable system error).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
