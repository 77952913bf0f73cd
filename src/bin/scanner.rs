use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use courier_verify::{
    config::AppConfig,
    models::{
        job::{Job, JobStatus, Order},
        verification::{Proof, VerificationKind},
    },
    services::{
        camera::{CameraManager, DirectoryCamera},
        context::VerificationContext,
        scan_loop::{ScanController, ScanOutcome},
        trust_client::DeliveryServiceClient,
        verification::{report, VerificationEngine},
    },
};
use tracing_subscriber::EnvFilter;

/// Scan a camera source for a proof marker and submit it for a job.
#[derive(Debug, Parser)]
#[command(name = "scanner", version)]
struct Args {
    /// Job to verify
    #[arg(long)]
    job_id: String,

    /// Which leg the proof covers
    #[arg(long, value_enum)]
    kind: VerificationKindArg,

    /// Directory of frames to scan (defaults to CAMERA_DIR)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Give up after this many seconds without a detection
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum VerificationKindArg {
    Pickup,
    Delivery,
}

impl From<VerificationKindArg> for VerificationKind {
    fn from(arg: VerificationKindArg) -> Self {
        match arg {
            VerificationKindArg::Pickup => Self::Pickup,
            VerificationKindArg::Delivery => Self::Delivery,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let args = Args::parse();
    let kind = VerificationKind::from(args.kind);

    // Load configuration
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let Some(frames) = args.frames.clone().or_else(|| config.camera_dir.clone()) else {
        tracing::error!("No frame source: pass --frames or set CAMERA_DIR");
        return ExitCode::FAILURE;
    };

    let camera = Arc::new(CameraManager::new(
        Arc::new(DirectoryCamera::new(&frames)),
        config.capture_constraints(),
    ));
    let scanner = ScanController::new(
        camera,
        config.scan_interval(),
        config.placeholder_proof_code.clone(),
    );

    let client = DeliveryServiceClient::new(
        &config.trust_service_url,
        &config.status_service_url,
        config.api_token.clone(),
    );
    let engine = VerificationEngine::new(client.clone(), client);

    // The job lives elsewhere; only its id matters to the trust service.
    let context = VerificationContext::new();
    context.set_pending(
        ad_hoc_job(&args.job_id),
        kind,
        Box::new(|job: &Job, kind: VerificationKind| {
            tracing::info!(job_id = %job.id, kind = %kind, "Proof accepted");
        }),
    );

    tracing::info!(
        job_id = %args.job_id,
        kind = %kind,
        frames = %frames.display(),
        "Starting marker scan"
    );

    let session = match scanner.start_scan() {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Could not start scan");
            return ExitCode::FAILURE;
        }
    };
    let (handle, mut outcome) = session.into_parts();

    // Timeout policy belongs to the caller, not the scan loop.
    let outcome = tokio::select! {
        result = &mut outcome => result.unwrap_or(ScanOutcome::Cancelled),
        _ = tokio::time::sleep(Duration::from_secs(args.timeout_secs)) => {
            tracing::warn!(timeout_secs = args.timeout_secs, "No marker detected before timeout");
            handle.stop();
            outcome.await.unwrap_or(ScanOutcome::Cancelled)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping scan");
            handle.stop();
            outcome.await.unwrap_or(ScanOutcome::Cancelled)
        }
    };

    let detection = match outcome {
        ScanOutcome::Detected(detection) => detection,
        ScanOutcome::Cancelled => return ExitCode::FAILURE,
        ScanOutcome::Failed(e) => {
            tracing::error!(error = %e, "Scan failed");
            return ExitCode::FAILURE;
        }
    };

    let result = engine
        .verify_pending(&context, &Proof::Detected(detection))
        .await;
    context.clear();

    let summary = report(&args.job_id, kind, &result);
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to render report"),
    }

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn ad_hoc_job(job_id: &str) -> Job {
    let mut job = Job::from_claimed(
        Order {
            id: job_id.to_string(),
            receiver_name: String::new(),
            pickup_address: String::new(),
            delivery_address: String::new(),
            status: JobStatus::Pending,
            priority: None,
        },
        Utc::now(),
    );
    job.status = JobStatus::InProgress;
    job
}
