//! Health check handler

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};
use serde::Serialize;

use ledgerlens_core::ai::AIBackend;

use crate::AppState;

/// Upper bound on the backend probe so the health endpoint stays fast
const BACKEND_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub backend: BackendHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
    pub kind: &'static str,
    pub model: String,
    pub reachable: bool,
}

/// GET /api/health - Liveness plus database and model backend reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.search.db().conn().is_ok();
    let reachable = tokio::time::timeout(BACKEND_PROBE_TIMEOUT, state.backend.health_check())
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        backend: BackendHealth {
            kind: state.backend.kind(),
            model: state.backend.model().to_string(),
            reachable,
        },
    })
}
