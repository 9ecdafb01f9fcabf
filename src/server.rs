//! HTTP surface: `/metrics`, `/reload` and `/health`.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::collector::ExpiryCollector;
use crate::loader::ConfigLoader;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<ExpiryCollector>,
    pub loader: Arc<ConfigLoader>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/reload", get(reload_handler).post(reload_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        info!(%address, "Listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Runs one collection cycle on the blocking pool; handshakes are blocking.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let collector = Arc::clone(&state.collector);
    let content_type = collector.gauges().content_type();

    match tokio::task::spawn_blocking(move || collector.scrape()).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Ok(Err(err)) => {
            error!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            error!(error = %err, "collection cycle aborted");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Always answers 200 and lists the endpoints active after the attempt.
async fn reload_handler(State(state): State<AppState>) -> String {
    state.loader.reload().await.to_string()
}

async fn health_handler() -> &'static str {
    "ok"
}
