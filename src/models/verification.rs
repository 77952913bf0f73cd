use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::frame::DetectionResult;

/// Which leg of a delivery a proof covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationKind {
    Pickup,
    Delivery,
}

/// Party whose code the trust service checks.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrustRole {
    Donor,
    Receiver,
}

/// Status written to the job-status service after a verified proof.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusKind {
    Pickup,
    Delivered,
}

impl VerificationKind {
    pub fn trust_role(self) -> TrustRole {
        match self {
            Self::Pickup => TrustRole::Donor,
            Self::Delivery => TrustRole::Receiver,
        }
    }

    pub fn status_kind(self) -> StatusKind {
        match self {
            Self::Pickup => StatusKind::Pickup,
            Self::Delivery => StatusKind::Delivered,
        }
    }
}

/// Candidate proof for a verification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Proof {
    /// Code typed in by the courier.
    Entered(String),
    /// Code produced by the marker detector.
    Detected(DetectionResult),
}

impl Proof {
    /// The code string both channels converge to.
    pub fn candidate_code(&self) -> &str {
        match self {
            Self::Entered(code) => code,
            Self::Detected(detection) => &detection.code,
        }
    }

    pub fn channel(&self) -> &'static str {
        match self {
            Self::Entered(_) => "code",
            Self::Detected(_) => "marker",
        }
    }
}

/// Request to verify a proof for a job (manual code entry).
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[garde(length(min = 1, max = 64))]
    pub job_id: String,

    #[garde(skip)]
    pub kind: VerificationKind,

    /// Format is checked by the verification engine so every malformed code
    /// is reported as an invalid proof.
    #[garde(skip)]
    pub code: String,
}

/// Request to hand a job over to the verification screen.
#[derive(Debug, Deserialize)]
pub struct BeginVerificationRequest {
    pub kind: VerificationKind,
}

/// Unified outcome reported to the UI layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationReport {
    pub job_id: String,
    pub kind: VerificationKind,
    /// `success`, `rejected` or `error`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Whether the job-status write went through (best-effort).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_updated: Option<bool>,
    pub recoverable: bool,
}
