//! Health/status endpoint
//!
//! `GET /health` returns the current `ServerStatus` as JSON, `200 OK`
//! while running and `503` once shutdown has begun.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::server::ServerHandle;

/// Routes served by the health listener
pub fn router(server: ServerHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(server)
}

/// Serve status on `listener` until `shutdown` is cancelled
pub async fn serve(listener: TcpListener, server: ServerHandle, shutdown: CancellationToken) {
    if let Ok(addr) = listener.local_addr() {
        info!("Health endpoint on {}", addr);
    }

    if let Err(e) = axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        warn!("Health endpoint failed: {}", e);
    }
    debug!("Health endpoint stopped");
}

async fn health(State(server): State<ServerHandle>) -> Response {
    match server.status().await {
        Ok(status) if !status.stopped => (StatusCode::OK, Json(status)).into_response(),
        Ok(status) => (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "stopped": true })),
        )
            .into_response(),
    }
}
