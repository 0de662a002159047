use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::hub::Hub;
use crate::websocket::websocket_handler;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    status: &'static str,
    clients: usize,
}

/// GET /health - process health and registered client count. Read-only.
pub async fn health_check(State(hub): State<Arc<Hub>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        clients: hub.client_count().await,
    })
}

pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket_handler))
        .with_state(hub)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
