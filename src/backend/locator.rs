//! Backend discovery.
//!
//! The backend may run locally during development and on a LAN address
//! elsewhere. Rather than hard-coding one, the workflow asks a
//! [`BackendLocator`] for a base address once, before the first write.

use crate::config::BackendConfig;
use crate::error::Cv2CareerError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces the base address of a reachable backend.
#[async_trait]
pub trait BackendLocator: Send + Sync {
    /// Base address without a trailing slash, e.g. `http://localhost:5000`.
    async fn locate(&self) -> Result<String, Cv2CareerError>;
}

/// Always returns the configured address, without probing.
#[derive(Debug, Clone)]
pub struct FixedLocator {
    base_url: String,
}

impl FixedLocator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalise_base(&base_url.into()),
        }
    }
}

#[async_trait]
impl BackendLocator for FixedLocator {
    async fn locate(&self) -> Result<String, Cv2CareerError> {
        Ok(self.base_url.clone())
    }
}

/// Probes each candidate's health endpoint in order and returns the first
/// one answering `200 OK`.
#[derive(Debug, Clone)]
pub struct HealthProbeLocator {
    candidates: Vec<String>,
    health_path: String,
    http: reqwest::Client,
}

impl HealthProbeLocator {
    pub fn new(
        candidates: Vec<String>,
        health_path: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, Cv2CareerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Cv2CareerError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            candidates: candidates.iter().map(|c| normalise_base(c)).collect(),
            health_path: health_path.into(),
            http,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, Cv2CareerError> {
        Self::new(
            config.candidates.clone(),
            config.health_path.clone(),
            config.timeout_secs,
        )
    }
}

#[async_trait]
impl BackendLocator for HealthProbeLocator {
    async fn locate(&self) -> Result<String, Cv2CareerError> {
        if self.candidates.is_empty() {
            return Err(Cv2CareerError::InvalidConfig(
                "No backend address configured".into(),
            ));
        }

        for base in &self.candidates {
            let url = format!("{}{}", base, self.health_path);
            match self.http.get(&url).send().await {
                Ok(r) if r.status() == reqwest::StatusCode::OK => {
                    info!("Backend detected at {}", base);
                    return Ok(base.clone());
                }
                Ok(r) => debug!("Health probe {} answered HTTP {}", url, r.status()),
                Err(e) => debug!("Health probe {} failed: {}", url, e),
            }
        }

        warn!("No backend answered its health probe");
        Err(Cv2CareerError::NoBackendReachable {
            tried: self.candidates.clone(),
        })
    }
}

fn normalise_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
