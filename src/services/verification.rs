use std::time::Instant;

use tracing::{error, info, warn};

use crate::models::verification::{Proof, VerificationKind, VerificationReport};
use crate::services::context::VerificationContext;
use crate::services::trust_client::{is_verified, ServiceError, StatusService, TrustService};

/// Number of digits in a proof code.
const PROOF_CODE_LEN: usize = 6;

/// A proof the trust service accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedProof {
    pub job_id: String,
    pub kind: VerificationKind,
    /// Whether the follow-up job-status write succeeded.
    pub status_updated: bool,
}

/// Runs a verification attempt end to end: proof format, trust verdict,
/// best-effort status write, then the pending context's completion.
pub struct VerificationEngine<T, S> {
    trust: T,
    status: S,
}

impl<T: TrustService, S: StatusService> VerificationEngine<T, S> {
    pub fn new(trust: T, status: S) -> Self {
        Self { trust, status }
    }

    /// Verify `proof` for the pending verification of (`job_id`, `kind`).
    ///
    /// On rejection or a retryable error the context is left in place so the
    /// courier can try again.
    pub async fn verify(
        &self,
        ctx: &VerificationContext,
        job_id: &str,
        kind: VerificationKind,
        proof: &Proof,
    ) -> Result<VerifiedProof, VerificationError> {
        let start = Instant::now();
        let channel = proof.channel();
        metrics::counter!("verification_attempts_total", "kind" => kind.to_string(), "channel" => channel)
            .increment(1);

        let result = self.verify_inner(ctx, job_id, kind, proof).await;

        metrics::histogram!("verification_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(verified) => {
                metrics::counter!("verification_succeeded_total", "kind" => kind.to_string())
                    .increment(1);
                info!(
                    job_id,
                    kind = %kind,
                    channel,
                    status_updated = verified.status_updated,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Proof verified"
                );
            }
            Err(VerificationError::Rejected) => {
                metrics::counter!("verification_rejected_total", "kind" => kind.to_string())
                    .increment(1);
                info!(job_id, kind = %kind, channel, "Proof rejected");
            }
            Err(e) => {
                metrics::counter!("verification_errors_total", "error" => e.kind()).increment(1);
                warn!(job_id, kind = %kind, channel, error = %e, "Verification failed");
            }
        }
        result
    }

    /// Verify `proof` against whatever verification is currently pending.
    pub async fn verify_pending(
        &self,
        ctx: &VerificationContext,
        proof: &Proof,
    ) -> Result<VerifiedProof, VerificationError> {
        let pending = ctx
            .pending()
            .map_err(|e| VerificationError::MissingContext(e.to_string()))?;
        self.verify(ctx, &pending.job.id, pending.kind, proof).await
    }

    async fn verify_inner(
        &self,
        ctx: &VerificationContext,
        job_id: &str,
        kind: VerificationKind,
        proof: &Proof,
    ) -> Result<VerifiedProof, VerificationError> {
        let code = proof.candidate_code();
        validate_proof(code)?;

        let pending = ctx
            .pending()
            .map_err(|e| VerificationError::MissingContext(e.to_string()))?;
        if pending.job.id != job_id || pending.kind != kind {
            return Err(VerificationError::MissingContext(format!(
                "pending verification is {} for job {}, not {} for job {}",
                pending.kind, pending.job.id, kind, job_id
            )));
        }

        let verdict = self
            .trust
            .verify_code(job_id, kind.trust_role(), code)
            .await?;
        if !is_verified(&verdict) {
            return Err(VerificationError::Rejected);
        }

        // Bookkeeping only: a failed write does not undo a valid proof.
        let status_updated = match self.status.update_status(job_id, kind.status_kind()).await {
            Ok(()) => true,
            Err(e) => {
                metrics::counter!("status_update_failures_total").increment(1);
                error!(
                    job_id,
                    status = %kind.status_kind(),
                    error = %e,
                    "Job status update failed after verified proof"
                );
                false
            }
        };

        if !ctx.complete(job_id, kind) {
            warn!(job_id, kind = %kind, "Pending verification changed before completion");
        }

        Ok(VerifiedProof {
            job_id: job_id.to_string(),
            kind,
            status_updated,
        })
    }
}

/// A proof code is exactly six ASCII digits.
pub fn validate_proof(code: &str) -> Result<(), VerificationError> {
    if code.len() == PROOF_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(VerificationError::InvalidProof(format!(
            "expected {PROOF_CODE_LEN} digits, got {} characters",
            code.chars().count()
        )))
    }
}

/// Flatten an attempt into the structure returned to the UI layer.
pub fn report(
    job_id: &str,
    kind: VerificationKind,
    result: &Result<VerifiedProof, VerificationError>,
) -> VerificationReport {
    match result {
        Ok(verified) => VerificationReport {
            job_id: job_id.to_string(),
            kind,
            outcome: "success".to_string(),
            error_kind: None,
            message: None,
            status_updated: Some(verified.status_updated),
            recoverable: true,
        },
        Err(e) => VerificationReport {
            job_id: job_id.to_string(),
            kind,
            outcome: match e {
                VerificationError::Rejected => "rejected",
                _ => "error",
            }
            .to_string(),
            error_kind: Some(e.kind().to_string()),
            message: Some(e.to_string()),
            status_updated: None,
            recoverable: e.is_recoverable(),
        },
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum VerificationError {
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Proof was rejected by the trust service")]
    Rejected,

    #[error("Trust service unreachable: {0}")]
    Transport(String),

    #[error("Unexpected trust service response: {0}")]
    Protocol(String),

    #[error("Verification context missing: {0}")]
    MissingContext(String),
}

impl VerificationError {
    /// Stable identifier for logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidProof(_) => "invalid_proof",
            Self::Rejected => "verification_rejected",
            Self::Transport(_) => "transport_error",
            Self::Protocol(_) => "protocol_error",
            Self::MissingContext(_) => "missing_context",
        }
    }

    /// False when the courier must restart from the job list.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::MissingContext(_))
    }
}

impl From<ServiceError> for VerificationError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Http(e) => Self::Transport(e.to_string()),
            ServiceError::Protocol(msg) => Self::Protocol(msg),
            ServiceError::InvalidUrl(msg) => Self::Transport(msg),
        }
    }
}
