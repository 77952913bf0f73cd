//! Polling loop that samples camera frames until a marker shows up.
//!
//! One cooperative task per scan. Each tick reads a single frame and analyzes
//! it before the next tick is scheduled, and the cancellation flag is checked
//! once per tick and again before a result is acted on.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::models::frame::DetectionResult;
use crate::services::camera::{CameraError, CameraManager, StreamHandle};
use crate::services::frame_analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Scanning,
    Detected,
    Cancelled,
    Failed,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Detected | Self::Cancelled | Self::Failed)
    }
}

/// Final result of one scan, delivered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Detected(DetectionResult),
    Cancelled,
    Failed(CameraError),
}

impl ScanOutcome {
    pub fn state(&self) -> ScanState {
        match self {
            Self::Detected(_) => ScanState::Detected,
            Self::Cancelled => ScanState::Cancelled,
            Self::Failed(_) => ScanState::Failed,
        }
    }
}

/// Cloneable control over a running scan.
#[derive(Clone)]
pub struct ScanHandle {
    cancel: Arc<watch::Sender<bool>>,
    state: watch::Receiver<ScanState>,
}

impl ScanHandle {
    /// Request cancellation. Takes effect by the next tick at the latest.
    pub fn stop(&self) {
        if !self.cancel.send_replace(true) {
            debug!("Scan stop requested");
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    /// Watch channel following the scan's state.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }
}

/// A started scan: its control handle plus the one-shot outcome.
pub struct ScanSession {
    handle: ScanHandle,
    outcome: oneshot::Receiver<ScanOutcome>,
}

impl ScanSession {
    pub fn handle(&self) -> &ScanHandle {
        &self.handle
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Wait for the scan to end.
    pub async fn outcome(self) -> ScanOutcome {
        self.outcome.await.unwrap_or(ScanOutcome::Cancelled)
    }

    pub fn into_parts(self) -> (ScanHandle, oneshot::Receiver<ScanOutcome>) {
        (self.handle, self.outcome)
    }
}

/// Starts scans against the shared camera.
pub struct ScanController {
    camera: Arc<CameraManager>,
    interval: Duration,
    placeholder_code: String,
}

impl ScanController {
    pub fn new(camera: Arc<CameraManager>, interval: Duration, placeholder_code: String) -> Self {
        Self {
            camera,
            interval,
            placeholder_code,
        }
    }

    /// Acquire the camera and spawn the polling task. Must be called inside a
    /// Tokio runtime. Nothing is spawned if acquisition fails.
    pub fn start_scan(&self) -> Result<ScanSession, CameraError> {
        let stream = self.camera.acquire()?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ScanState::Scanning);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        metrics::counter!("scan_sessions_total").increment(1);
        info!(
            stream_id = %stream.id(),
            interval_ms = self.interval.as_millis() as u64,
            "Scan started"
        );

        tokio::spawn(run_scan_loop(
            stream,
            self.interval,
            self.placeholder_code.clone(),
            cancel_rx,
            state_tx,
            outcome_tx,
        ));

        Ok(ScanSession {
            handle: ScanHandle {
                cancel: Arc::new(cancel_tx),
                state: state_rx,
            },
            outcome: outcome_rx,
        })
    }
}

async fn run_scan_loop(
    mut stream: StreamHandle,
    interval: Duration,
    placeholder_code: String,
    mut cancel: watch::Receiver<bool>,
    state: watch::Sender<ScanState>,
    outcome_tx: oneshot::Sender<ScanOutcome>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames: u64 = 0;

    let outcome = loop {
        let control_gone = tokio::select! {
            _ = ticker.tick() => false,
            changed = cancel.changed() => changed.is_err(),
        };
        // A dropped outcome receiver means the consumer navigated away.
        if control_gone || *cancel.borrow() || outcome_tx.is_closed() {
            break ScanOutcome::Cancelled;
        }

        let frame = match stream.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => break ScanOutcome::Failed(e),
        };

        let analysis = match tokio::task::spawn_blocking(move || frame_analyzer::analyze(&frame))
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "Frame analysis task panicked");
                continue;
            }
        };

        // Discard a result that finished after stop was requested.
        if *cancel.borrow() {
            break ScanOutcome::Cancelled;
        }

        frames += 1;
        metrics::counter!("scan_frames_analyzed_total").increment(1);
        if analysis.present {
            info!(
                frames,
                finder_patterns = analysis.finder_patterns,
                contrast_areas = analysis.contrast_areas,
                square_edges = analysis.square_edges,
                "Marker detected"
            );
            break ScanOutcome::Detected(DetectionResult::placeholder(placeholder_code.as_str()));
        }
    };

    stream.release();
    state.send_replace(outcome.state());
    match &outcome {
        ScanOutcome::Failed(e) => warn!(frames, error = %e, "Scan failed"),
        other => info!(frames, state = ?other.state(), "Scan finished"),
    }
    let _ = outcome_tx.send(outcome);
}
