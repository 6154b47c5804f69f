//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Single-shot REST delivery of angle samples."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
use std::time::Duration;

use incline_common::{RestConfig, TargetConfig};
use incline_sim::AngleSample;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::{endpoint, TransportError};

/// Path the monitor accepts samples on.
pub const ANGLES_PATH: &str = "/api/angles";

/// Reply from the monitor. Any status counts as a completed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct RestReply {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl RestReply {
    /// Whether the monitor accepted the sample at the application level.
    pub fn is_accepted(&self) -> bool {
        self.status.is_success()
    }
}

/// Posts one sample per call to `POST /api/angles`.
#[derive(Debug, Clone)]
pub struct RestSender {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl RestSender {
    pub fn new(target: &TargetConfig, config: &RestConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(TransportError::ClientSetup)?;
        Ok(Self {
            client,
            url: endpoint("http", target, ANGLES_PATH)?,
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Deliver `sample` once. No retries.
    ///
    /// Returns the status and decoded body even for non-success statuses.
    /// Connection failures, timeouts and bodies that are not JSON come back
    /// as [`TransportError`].
    pub async fn send_single(&self, sample: &AngleSample) -> Result<RestReply, TransportError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(sample)
            .send()
            .await
            .map_err(|err| TransportError::from_reqwest(&self.url, self.timeout, err))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::from_reqwest(&self.url, self.timeout, err))?;
        let body = serde_json::from_slice(&bytes).map_err(|err| TransportError::Protocol {
            url: self.url.to_string(),
            details: format!("{status} response body is not JSON: {err}"),
        })?;

        if status.is_success() {
            debug!(url = %self.url, status = status.as_u16(), "sample delivered");
        } else {
            warn!(url = %self.url, status = status.as_u16(), "monitor answered with non-success status");
        }
        Ok(RestReply { status, body })
    }
}
