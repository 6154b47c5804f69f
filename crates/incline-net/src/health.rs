//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Liveness probe for the monitoring service."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
use std::time::Duration;

use incline_common::{HealthConfig, TargetConfig};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{endpoint, TransportError};

pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    clients: Option<u64>,
}

/// Why the monitor was reported down.
#[derive(Debug, thiserror::Error)]
pub enum HealthFault {
    #[error("monitor returned status {0}")]
    UnexpectedStatus(StatusCode),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outcome of a probe. Being down is an answer, not an error.
#[derive(Debug)]
pub enum HealthStatus {
    Up { clients: u64 },
    Down { reason: HealthFault },
}

impl HealthStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, HealthStatus::Up { .. })
    }

    /// Connected client count, when the monitor is up.
    pub fn clients(&self) -> Option<u64> {
        match self {
            HealthStatus::Up { clients } => Some(*clients),
            HealthStatus::Down { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(target: &TargetConfig, config: &HealthConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(TransportError::ClientSetup)?;
        Ok(Self {
            client,
            url: endpoint("http", target, HEALTH_PATH)?,
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Query `GET /health` once.
    pub async fn check(&self) -> HealthStatus {
        let status = match self.query().await {
            Ok(clients) => HealthStatus::Up { clients },
            Err(reason) => HealthStatus::Down { reason },
        };
        match &status {
            HealthStatus::Up { clients } => debug!(url = %self.url, clients, "monitor is up"),
            HealthStatus::Down { reason } => warn!(url = %self.url, error = %reason, "monitor is down"),
        }
        status
    }

    async fn query(&self) -> Result<u64, HealthFault> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| TransportError::from_reqwest(&self.url, self.timeout, err))?;
        if response.status() != StatusCode::OK {
            return Err(HealthFault::UnexpectedStatus(response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::from_reqwest(&self.url, self.timeout, err))?;
        let body: HealthBody =
            serde_json::from_slice(&bytes).map_err(|err| TransportError::Protocol {
                url: self.url.to_string(),
                details: format!("health body is not JSON: {err}"),
            })?;
        Ok(body.clients.unwrap_or(0))
    }
}
