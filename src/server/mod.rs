//! HTTP server for the analysis service.
//!
//! This module provides:
//! - The axum router and handlers (`routes`)
//! - Configuration types (`config`)
//!
//! Every core failure becomes a generic error body; the cause is logged
//! server-side and never sent to the client.

pub mod config;
mod routes;

pub use routes::{ApiError, AppState, router};

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
