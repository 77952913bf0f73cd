use std::sync::Arc;

use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics
///
/// Verification, scan and job-transition counters in Prometheus text format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}

/// Register descriptions for the metrics this service emits.
pub fn describe() {
    metrics::describe_counter!(
        "verification_attempts_total",
        "Verification attempts by kind and proof channel"
    );
    metrics::describe_counter!(
        "verification_succeeded_total",
        "Proofs accepted by the trust service"
    );
    metrics::describe_counter!(
        "verification_rejected_total",
        "Proofs rejected by the trust service"
    );
    metrics::describe_counter!(
        "verification_errors_total",
        "Verification attempts that ended in an error"
    );
    metrics::describe_counter!(
        "status_update_failures_total",
        "Job-status writes that failed after a verified proof"
    );
    metrics::describe_histogram!(
        "verification_seconds",
        "Time to run one verification attempt"
    );
    metrics::describe_counter!("scan_sessions_total", "Scans started");
    metrics::describe_counter!(
        "scan_frames_analyzed_total",
        "Camera frames run through the marker detector"
    );
    metrics::describe_gauge!("camera_streams_active", "Camera streams currently held");
    metrics::describe_counter!(
        "job_transitions_total",
        "Job lifecycle transitions by action"
    );
}
