use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::job::Order;
use crate::services::camera::{CaptureConstraints, FacingMode};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the trust-verification service
    pub trust_service_url: String,

    /// Base URL of the job-status service
    pub status_service_url: String,

    /// Bearer token for both outbound services
    #[serde(default)]
    pub api_token: Option<String>,

    /// Scan loop polling interval in milliseconds
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Directory of image frames used as the capture device
    #[serde(default)]
    pub camera_dir: Option<PathBuf>,

    #[serde(default)]
    pub camera_facing: FacingMode,

    #[serde(default = "default_camera_width")]
    pub camera_width: u32,

    #[serde(default = "default_camera_height")]
    pub camera_height: u32,

    /// Code submitted when the marker detector fires. The detector never
    /// decodes a payload, so this fixed value stands in for one.
    #[serde(default = "default_placeholder_proof_code")]
    pub placeholder_proof_code: String,

    /// JSON file with orders to seed the available pool
    #[serde(default)]
    pub orders_file: Option<PathBuf>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_scan_interval_ms() -> u64 {
    100
}

fn default_camera_width() -> u32 {
    1280
}

fn default_camera_height() -> u32 {
    720
}

fn default_placeholder_proof_code() -> String {
    "123456".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    pub fn capture_constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            facing: self.camera_facing,
            width: self.camera_width,
            height: self.camera_height,
        }
    }
}

/// Read the seed orders file (a JSON array of orders).
pub fn load_orders(path: &Path) -> Result<Vec<Order>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Orders {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid orders file {}: {source}", .path.display())]
    Orders {
        path: PathBuf,
        source: serde_json::Error,
    },
}
