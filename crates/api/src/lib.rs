//! `api` crate: HTTP surface for the reconciler.
//!
//! Exposes:
//!   POST   /api/v1/runs      start a run from a trigger payload
//!   GET    /api/v1/status    stored site status
//!   GET    /healthz          liveness

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use engine::Reconciler;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/runs", post(handlers::runs::start))
        .route("/api/v1/status", get(handlers::status::current))
        .route("/healthz", get(handlers::status::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
