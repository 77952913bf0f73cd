//! Test helper utilities: fake trust/status services and app wiring

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use courier_verify::app_state::AppState;
use courier_verify::models::job::Order;
use courier_verify::routes;
use courier_verify::services::{
    camera::{CameraDevice, CameraManager, CaptureConstraints, DirectoryCamera, UnavailableCamera},
    context::VerificationContext,
    job_store::JobStore,
    scan_loop::ScanController,
    trust_client::DeliveryServiceClient,
    verification::VerificationEngine,
};

pub const PLACEHOLDER_CODE: &str = "123456";

/// One recorded call to the fake trust endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustCall {
    pub job_id: String,
    pub role: String,
    pub code: String,
}

/// One recorded call to the fake job-status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCall {
    pub job_id: String,
    pub status: String,
}

#[derive(Clone)]
struct FakeState {
    verdict: Arc<Mutex<String>>,
    status_code: Arc<Mutex<StatusCode>>,
    trust_calls: Arc<Mutex<Vec<TrustCall>>>,
    status_calls: Arc<Mutex<Vec<StatusCall>>>,
}

/// Handle to fake trust + status services running on an ephemeral port.
pub struct FakeServices {
    pub base_url: String,
    state: FakeState,
}

impl FakeServices {
    pub fn trust_calls(&self) -> Vec<TrustCall> {
        self.state.trust_calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> Vec<StatusCall> {
        self.state.status_calls.lock().unwrap().clone()
    }

    /// Change the raw body the trust endpoint answers with.
    pub fn set_verdict(&self, body: &str) {
        *self.state.verdict.lock().unwrap() = body.to_string();
    }

    pub fn set_status_code(&self, code: StatusCode) {
        *self.state.status_code.lock().unwrap() = code;
    }

    pub fn client(&self) -> DeliveryServiceClient {
        DeliveryServiceClient::new(&self.base_url, &self.base_url, Some("test-token".to_string()))
    }
}

#[derive(Deserialize)]
struct VerifyQuery {
    #[serde(rename = "jobId")]
    job_id: String,
    #[serde(rename = "type")]
    role: String,
    code: String,
}

async fn fake_verify(
    State(state): State<FakeState>,
    Query(query): Query<VerifyQuery>,
) -> String {
    state.trust_calls.lock().unwrap().push(TrustCall {
        job_id: query.job_id,
        role: query.role,
        code: query.code,
    });
    state.verdict.lock().unwrap().clone()
}

async fn fake_status(
    State(state): State<FakeState>,
    UrlPath(job_id): UrlPath<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    state.status_calls.lock().unwrap().push(StatusCall {
        job_id,
        status: body["status"].as_str().unwrap_or_default().to_string(),
    });
    *state.status_code.lock().unwrap()
}

/// Start fake services answering `verdict` from the trust endpoint.
pub async fn spawn_fake_services(verdict: &str) -> FakeServices {
    let state = FakeState {
        verdict: Arc::new(Mutex::new(verdict.to_string())),
        status_code: Arc::new(Mutex::new(StatusCode::OK)),
        trust_calls: Arc::default(),
        status_calls: Arc::default(),
    };
    let app = Router::new()
        .route("/verify", get(fake_verify))
        .route("/jobs/{job_id}/status", put(fake_status))
        .with_state(state.clone());

    FakeServices {
        base_url: serve(app).await,
        state,
    }
}

/// Serve `app` on 127.0.0.1 with an ephemeral port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Wire an `AppState` against the fake services, optionally with a
/// directory camera.
pub fn app_state(
    services: &FakeServices,
    orders: Vec<Order>,
    camera_dir: Option<&Path>,
) -> AppState {
    let device: Arc<dyn CameraDevice> = match camera_dir {
        Some(dir) => Arc::new(DirectoryCamera::new(dir)),
        None => Arc::new(UnavailableCamera),
    };
    let camera = Arc::new(CameraManager::new(device, CaptureConstraints::default()));
    let scanner = ScanController::new(
        camera,
        Duration::from_millis(10),
        PLACEHOLDER_CODE.to_string(),
    );
    let engine = VerificationEngine::new(services.client(), services.client());

    AppState::new(
        JobStore::with_orders(orders),
        VerificationContext::new(),
        engine,
        scanner,
    )
}

/// Serve the courier API for `state` and return its base URL.
pub async fn spawn_app(state: AppState) -> String {
    serve(routes::router(state)).await
}
