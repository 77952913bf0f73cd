use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::verification::VerificationReport;
use crate::services::{
    context::VerificationContext,
    job_store::JobStore,
    scan_loop::{ScanController, ScanHandle},
    trust_client::DeliveryServiceClient,
    verification::VerificationEngine,
};

/// Engine wired to the HTTP trust and status services.
pub type Engine = VerificationEngine<DeliveryServiceClient, DeliveryServiceClient>;

/// Scan started over the API and the last verification it produced.
#[derive(Default)]
pub struct ScanSlot {
    pub handle: Option<ScanHandle>,
    pub last_report: Option<VerificationReport>,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub context: Arc<VerificationContext>,
    pub engine: Arc<Engine>,
    pub scanner: Arc<ScanController>,
    pub scan: Arc<Mutex<ScanSlot>>,
}

impl AppState {
    pub fn new(
        store: JobStore,
        context: VerificationContext,
        engine: Engine,
        scanner: ScanController,
    ) -> Self {
        Self {
            store: Arc::new(store),
            context: Arc::new(context),
            engine: Arc::new(engine),
            scanner: Arc::new(scanner),
            scan: Arc::new(Mutex::new(ScanSlot::default())),
        }
    }
}
