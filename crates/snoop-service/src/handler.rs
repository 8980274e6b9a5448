//! Lookup API handlers.
//!
//! Read-only query surface over the registry. The service listing is not
//! filtered by liveness; single lookups only answer for live identities.

use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use snoop_core::SnoopError;
use std::sync::Arc;
use tracing::debug;

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Every stored descriptor, live or stale.
pub async fn handle_services(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.all_descriptors())
}

/// The descriptor of one live identity, or 404.
pub async fn handle_lookup(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
) -> Response {
    match state.registry.lookup(&identity) {
        Ok(descriptor) => (StatusCode::OK, Json(descriptor)).into_response(),
        Err(e) => {
            debug!("Lookup for {} failed: {}", identity, e);
            error_response(&e)
        }
    }
}

/// Identities currently live, sorted.
pub async fn handle_clients(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.live_identities())
}

/// Every stored client with its last heartbeat and liveness.
pub async fn handle_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.records())
}

fn error_response(err: &SnoopError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": err.to_string()}))).into_response()
}
