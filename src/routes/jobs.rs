use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::models::job::{Job, JobStatus, Order};
use crate::models::verification::{BeginVerificationRequest, VerificationKind};
use crate::routes::ApiError;
use crate::services::job_store::StoreError;

/// GET /api/v1/orders
///
/// Available (unclaimed) orders.
pub async fn list_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
    Json(state.store.list_orders())
}

/// POST /api/v1/orders
///
/// Add an order to the available pool.
pub async fn add_order(
    State(state): State<AppState>,
    Json(order): Json<Order>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    if order.id.trim().is_empty() {
        return Err(ApiError::Validation("order id must not be empty".to_string()));
    }
    state.store.add_order(order.clone());
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /api/v1/orders/{order_id}/claim
pub async fn claim_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.store.claim(&order_id)?))
}

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.store.list_jobs())
}

/// GET /api/v1/jobs/{job_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.store.get_job(&job_id)?))
}

/// POST /api/v1/jobs/{job_id}/start
pub async fn start_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.store.start(&job_id)?))
}

/// POST /api/v1/jobs/{job_id}/cancel
///
/// Also drops any pending verification for the job.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.store.cancel(&job_id)?;
    state.context.clear_for(&job_id);
    Ok(Json(order))
}

/// POST /api/v1/jobs/{job_id}/verification
///
/// Hand the job to the verification screen. A verified proof records the
/// leg in the store.
pub async fn begin_verification(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(request): Json<BeginVerificationRequest>,
) -> Result<StatusCode, ApiError> {
    let job = state.store.get_job(&job_id)?;
    if job.status != JobStatus::InProgress {
        return Err(StoreError::IllegalState {
            job_id: job.id,
            status: job.status,
            action: "verify",
        }
        .into());
    }

    let store = Arc::clone(&state.store);
    state.context.set_pending(
        job,
        request.kind,
        Box::new(move |job: &Job, kind: VerificationKind| {
            match store.complete(&job.id, kind) {
                Ok(updated) => info!(
                    job_id = %updated.id,
                    status = %updated.status,
                    "Job updated from verified proof"
                ),
                Err(e) => error!(
                    job_id = %job.id,
                    kind = %kind,
                    error = %e,
                    "Could not record verified proof"
                ),
            }
        }),
    );
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /api/v1/verification
///
/// The courier backed out.
pub async fn clear_verification(State(state): State<AppState>) -> StatusCode {
    state.context.clear();
    StatusCode::NO_CONTENT
}
