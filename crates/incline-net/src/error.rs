//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Transport fault taxonomy shared by every delivery client."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use incline_common::TargetConfig;
use url::Url;

/// Boxed error carried by stream faults.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Phase of a stream session in which a fault happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStage {
    Connect,
    Send,
    Close,
}

impl fmt::Display for StreamStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            StreamStage::Connect => "connect",
            StreamStage::Send => "send",
            StreamStage::Close => "close",
        };
        f.write_str(stage)
    }
}

/// Failure of a single delivery or probe.
///
/// Connectivity faults (`Connectivity`, `Timeout`, and stream faults raised
/// while connecting) mean the monitor could not be reached. `Protocol` means
/// it answered with something that is not JSON. A non-success HTTP status is
/// not a transport failure and never appears here.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not reach {url}: {reason}")]
    Connectivity {
        url: String,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("no response from {url} within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("unexpected reply from {url}: {details}")]
    Protocol { url: String, details: String },
    #[error("stream {stage} failed for {url}: {source}")]
    Stream {
        url: String,
        stage: StreamStage,
        #[source]
        source: BoxError,
    },
    #[error("stream session to {url} was abandoned after a failed send")]
    Abandoned { url: String },
    #[error("invalid monitor address {address:?}: {reason}")]
    InvalidTarget { address: String, reason: String },
    #[error("unable to build HTTP client")]
    ClientSetup(#[source] reqwest::Error),
}

impl TransportError {
    /// Classify a `reqwest` failure for a request sent to `url`.
    pub(crate) fn from_reqwest(url: &Url, timeout: Duration, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            TransportError::Timeout { url, timeout }
        } else if err.is_decode() || err.is_body() {
            TransportError::Protocol {
                url,
                details: err.to_string(),
            }
        } else {
            let reason = if err.is_connect() {
                "connection refused or host unreachable".to_owned()
            } else {
                err.to_string()
            };
            TransportError::Connectivity {
                url,
                reason,
                source: Some(err),
            }
        }
    }

    pub(crate) fn stream<E>(url: &Url, stage: StreamStage, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        TransportError::Stream {
            url: url.to_string(),
            stage,
            source: err.into(),
        }
    }

    /// True when the monitor could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            TransportError::Connectivity { .. }
                | TransportError::Timeout { .. }
                | TransportError::Stream {
                    stage: StreamStage::Connect,
                    ..
                }
        )
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, TransportError::Protocol { .. })
    }
}

/// Build `scheme://host:port{path}` for the configured monitor.
pub(crate) fn endpoint(scheme: &str, target: &TargetConfig, path: &str) -> Result<Url, TransportError> {
    let address = target.authority();
    let invalid = |reason: String| TransportError::InvalidTarget {
        address: address.clone(),
        reason,
    };
    let base = Url::parse(&format!("{scheme}://{address}")).map_err(|err| invalid(err.to_string()))?;
    if base.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_owned()));
    }
    base.join(path).map_err(|err| invalid(err.to_string()))
}
