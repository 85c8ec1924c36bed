use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub bookings: usize,
    pub clients: usize,
    pub storage_ok: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (bookings, bookings_path) = {
        let ledger = state.ledger.lock().await;
        (ledger.len(), ledger.path().to_path_buf())
    };
    let (clients, clients_path) = {
        let registry = state.clients.lock().await;
        (registry.len(), registry.path().to_path_buf())
    };

    let storage_ok = tokio::fs::metadata(&bookings_path).await.is_ok()
        && tokio::fs::metadata(&clients_path).await.is_ok();
    if !storage_ok {
        tracing::error!("Data files missing: {} / {}", bookings_path.display(), clients_path.display());
    }

    Json(HealthResponse {
        status: if storage_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        bookings,
        clients,
        storage_ok,
    })
}
