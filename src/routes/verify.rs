use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::verification::{Proof, VerificationReport, VerifyRequest};
use crate::routes::{verification_status, ApiError};
use crate::services::verification::report;

/// POST /api/v1/verify
///
/// Submit a manually entered proof code.
pub async fn submit_verification(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<VerificationReport>), ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let proof = Proof::Entered(request.code);
    let result = state
        .engine
        .verify(&state.context, &request.job_id, request.kind, &proof)
        .await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => verification_status(e),
    };
    Ok((status, Json(report(&request.job_id, request.kind, &result))))
}
