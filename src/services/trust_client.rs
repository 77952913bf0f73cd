use std::future::Future;

use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

use crate::models::verification::{StatusKind, TrustRole};

/// External trust service that checks a proof code.
pub trait TrustService: Send + Sync {
    /// Raw verdict payload; interpretation is left to the caller.
    fn verify_code(
        &self,
        job_id: &str,
        role: TrustRole,
        code: &str,
    ) -> impl Future<Output = Result<Value, ServiceError>> + Send;
}

/// External job-status service advanced after a verified proof.
pub trait StatusService: Send + Sync {
    fn update_status(
        &self,
        job_id: &str,
        status: StatusKind,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}

/// HTTP client for the trust-verification and job-status endpoints.
#[derive(Clone)]
pub struct DeliveryServiceClient {
    http: Client,
    trust_url: String,
    status_url: String,
    api_token: Option<String>,
}

impl DeliveryServiceClient {
    pub fn new(trust_url: &str, status_url: &str, api_token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            trust_url: trust_url.trim_end_matches('/').to_string(),
            status_url: status_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// `{status_url}/jobs/{job_id}/status` with the id as one encoded segment.
    fn status_endpoint(&self, job_id: &str) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.status_url)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {e}", self.status_url)))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.status_url.clone()))?
            .pop_if_empty()
            .extend(["jobs", job_id, "status"]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl TrustService for DeliveryServiceClient {
    /// GET {trust_url}/verify?jobId=..&type=donor|receiver&code=..
    async fn verify_code(
        &self,
        job_id: &str,
        role: TrustRole,
        code: &str,
    ) -> Result<Value, ServiceError> {
        let url = format!("{}/verify", self.trust_url);
        let role = role.to_string();

        let response = self
            .authorize(self.http.get(&url))
            .query(&[("jobId", job_id), ("type", role.as_str()), ("code", code)])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        debug!(job_id, role = %role, body_len = body.len(), "Trust service responded");
        parse_verdict_body(&body)
    }
}

impl StatusService for DeliveryServiceClient {
    /// PUT {status_url}/jobs/{job_id}/status with `{"status": ...}`.
    async fn update_status(&self, job_id: &str, status: StatusKind) -> Result<(), ServiceError> {
        let url = self.status_endpoint(job_id)?;

        self.authorize(self.http.put(url))
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?
            .error_for_status()?;

        debug!(job_id, status = %status, "Job status updated");
        Ok(())
    }
}

/// Parse a trust response body. Empty or non-JSON bodies are protocol errors.
pub fn parse_verdict_body(body: &str) -> Result<Value, ServiceError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Protocol("empty response body".to_string()));
    }
    serde_json::from_str(trimmed).map_err(|e| {
        ServiceError::Protocol(format!("response is not JSON ({e}): {}", truncate(trimmed)))
    })
}

/// Permissive verdict reading: `true`, `"true"`, `{"success": true}` and
/// `{"data": true}` all count as verified; anything else does not.
pub fn is_verified(verdict: &Value) -> bool {
    match verdict {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        Value::Object(map) => {
            map.get("success") == Some(&Value::Bool(true))
                || map.get("data") == Some(&Value::Bool(true))
        }
        _ => false,
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(120).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed service response: {0}")]
    Protocol(String),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
}
