use crate::aggregator_logic::state::AppState;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use lib_common::aggregator::Availability;
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/history", get(history_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

pub async fn run(addr: SocketAddr, app_state: AppState, shutdown: broadcast::Receiver<()>) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    serve(listener, app_state, shutdown).await
}

pub async fn serve(listener: TcpListener, app_state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    info!("Downstream server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(app_state))
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            info!("Downstream server shutting down.");
        })
        .await
        .context("downstream server failed")
}

async fn status_handler(State(state): State<AppState>) -> Response {
    match state.query().get_status() {
        Availability::Ready(snapshot) => Json(snapshot).into_response(),
        Availability::Pending => not_ready(),
    }
}

async fn history_handler(State(state): State<AppState>) -> Response {
    match state.query().get_history() {
        Availability::Ready(history) => Json(history).into_response(),
        Availability::Pending => not_ready(),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn not_ready() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "initializing",
            "error": "no collection cycle has completed yet"
        })),
    )
        .into_response()
}
