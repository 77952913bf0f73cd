use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::app_state::AppState;
use crate::models::verification::{Proof, VerificationReport};
use crate::routes::ApiError;
use crate::services::scan_loop::{ScanOutcome, ScanState};
use crate::services::verification::{report, VerificationError};

#[derive(Debug, Serialize)]
pub struct ScanStatusResponse {
    pub state: ScanState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<VerificationReport>,
}

/// GET /api/v1/scan
pub async fn scan_status(State(state): State<AppState>) -> Json<ScanStatusResponse> {
    let slot = state.scan.lock().await;
    Json(ScanStatusResponse {
        state: slot.handle.as_ref().map_or(ScanState::Idle, |h| h.state()),
        last_report: slot.last_report.clone(),
    })
}

/// POST /api/v1/scan/start
///
/// Scan for a marker and submit it as proof for the pending verification.
pub async fn start_scan(
    State(state): State<AppState>,
) -> Result<Json<ScanStatusResponse>, ApiError> {
    let pending = state
        .context
        .pending()
        .map_err(|e| VerificationError::MissingContext(e.to_string()))?;

    let mut slot = state.scan.lock().await;
    if slot.handle.as_ref().is_some_and(|h| !h.state().is_terminal()) {
        return Err(ApiError::ScanInProgress);
    }

    let (handle, outcome) = state.scanner.start_scan()?.into_parts();
    slot.handle = Some(handle.clone());
    slot.last_report = None;
    drop(slot);

    info!(job_id = %pending.job.id, kind = %pending.kind, "Scanning for proof marker");

    let task_state = state.clone();
    tokio::spawn(async move {
        let detection = match outcome.await {
            Ok(ScanOutcome::Detected(detection)) => detection,
            _ => return,
        };
        let job_id = pending.job.id;
        let result = task_state
            .engine
            .verify(
                &task_state.context,
                &job_id,
                pending.kind,
                &Proof::Detected(detection),
            )
            .await;
        task_state.scan.lock().await.last_report = Some(report(&job_id, pending.kind, &result));
    });

    Ok(Json(ScanStatusResponse {
        state: handle.state(),
        last_report: None,
    }))
}

/// POST /api/v1/scan/stop
///
/// The courier left the scan screen.
pub async fn stop_scan(State(state): State<AppState>) -> Json<ScanStatusResponse> {
    let slot = state.scan.lock().await;
    let scan_state = match slot.handle.as_ref() {
        Some(handle) => {
            handle.stop();
            handle.state()
        }
        None => ScanState::Idle,
    };
    Json(ScanStatusResponse {
        state: scan_state,
        last_report: slot.last_report.clone(),
    })
}
