use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::scan_loop::ScanState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub available_orders: usize,
    pub jobs: usize,
    pub verification_pending: bool,
    pub scan: ScanState,
}

/// GET /health
///
/// Liveness plus a summary of in-memory state.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let scan = state
        .scan
        .lock()
        .await
        .handle
        .as_ref()
        .map_or(ScanState::Idle, |h| h.state());

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            available_orders: state.store.list_orders().len(),
            jobs: state.store.list_jobs().len(),
            verification_pending: state.context.is_pending(),
            scan,
        },
    })
}
