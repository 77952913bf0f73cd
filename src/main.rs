use std::sync::Arc;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use courier_verify::app_state::AppState;
use courier_verify::config::{self, AppConfig};
use courier_verify::routes;
use courier_verify::services::{
    camera::{CameraDevice, CameraManager, DirectoryCamera, UnavailableCamera},
    context::VerificationContext,
    job_store::JobStore,
    scan_loop::ScanController,
    trust_client::DeliveryServiceClient,
    verification::VerificationEngine,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing courier-verify server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    // Seed the available order pool
    let store = match &config.orders_file {
        Some(path) => {
            let orders = config::load_orders(path).expect("Failed to load orders file");
            tracing::info!(count = orders.len(), path = %path.display(), "Seeding orders");
            JobStore::with_orders(orders)
        }
        None => JobStore::new(),
    };

    // Capture device
    let device: Arc<dyn CameraDevice> = match &config.camera_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Using directory camera");
            Arc::new(DirectoryCamera::new(dir))
        }
        None => {
            tracing::warn!("CAMERA_DIR not set; marker scanning is unavailable");
            Arc::new(UnavailableCamera)
        }
    };
    let camera = Arc::new(CameraManager::new(device, config.capture_constraints()));
    let scanner = ScanController::new(
        camera,
        config.scan_interval(),
        config.placeholder_proof_code.clone(),
    );

    // Trust and job-status services
    tracing::info!(
        trust = %config.trust_service_url,
        status = %config.status_service_url,
        "Initializing delivery service client"
    );
    let client = DeliveryServiceClient::new(
        &config.trust_service_url,
        &config.status_service_url,
        config.api_token.clone(),
    );
    let engine = VerificationEngine::new(client.clone(), client);

    // Create shared application state
    let state = AppState::new(store, VerificationContext::new(), engine, scanner);

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // 64 KB limit

    tracing::info!("Starting courier-verify on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
