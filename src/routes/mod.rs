use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::camera::CameraError;
use crate::services::job_store::StoreError;
use crate::services::verification::VerificationError;

pub mod health;
pub mod jobs;
pub mod metrics;
pub mod scan;
pub mod verify;

/// API routes for the courier client (everything except `/metrics`).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/orders", get(jobs::list_orders).post(jobs::add_order))
        .route("/api/v1/orders/{order_id}/claim", post(jobs::claim_order))
        .route("/api/v1/jobs", get(jobs::list_jobs))
        .route("/api/v1/jobs/{job_id}", get(jobs::get_job))
        .route("/api/v1/jobs/{job_id}/start", post(jobs::start_job))
        .route("/api/v1/jobs/{job_id}/cancel", post(jobs::cancel_job))
        .route(
            "/api/v1/jobs/{job_id}/verification",
            post(jobs::begin_verification),
        )
        .route("/api/v1/verification", delete(jobs::clear_verification))
        .route("/api/v1/verify", post(verify::submit_verification))
        .route("/api/v1/scan", get(scan::scan_status))
        .route("/api/v1/scan/start", post(scan::start_scan))
        .route("/api/v1/scan/stop", post(scan::stop_scan))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Error type for handlers; maps component errors to HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("A scan is already running")]
    ScanInProgress,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Store(StoreError::IllegalState { .. }) => (StatusCode::CONFLICT, "illegal_state"),
            Self::Camera(CameraError::PermissionDenied(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "permission_denied")
            }
            Self::Camera(CameraError::DeviceUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "device_unavailable")
            }
            Self::Verification(e) => (verification_status(e), e.kind()),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            Self::ScanInProgress => (StatusCode::CONFLICT, "scan_in_progress"),
        }
    }
}

/// HTTP status for a verification outcome.
pub fn verification_status(e: &VerificationError) -> StatusCode {
    match e {
        VerificationError::InvalidProof(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VerificationError::Rejected => StatusCode::FORBIDDEN,
        VerificationError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        VerificationError::Protocol(_) => StatusCode::BAD_GATEWAY,
        VerificationError::MissingContext(_) => StatusCode::GONE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::warn!(error = %self, kind, "Request failed");
        }
        let body = ErrorBody {
            error: kind,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
