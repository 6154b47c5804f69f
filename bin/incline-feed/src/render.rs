//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "binary"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Console rendering for incline-feed outcomes."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
use chrono::NaiveTime;
use incline_net::{DeliveryReceipt, FeedReport, HealthStatus, RestReply, TransportError};
use incline_sim::AngleSample;

const RULE: &str = "==================================================";

pub fn banner() -> String {
    format!("\n{RULE}\n  Inclination Angle Monitor - Test Tool\n{RULE}")
}

pub fn footer() -> String {
    format!("\n{RULE}\n")
}

pub fn rest_outcome(outcome: &Result<RestReply, TransportError>) -> String {
    match outcome {
        Ok(reply) => format!("✓ Status: {}\n✓ Response: {}", reply.status.as_u16(), reply.body),
        Err(err) => failure(err),
    }
}

pub fn stream_outcome(url: &str, outcome: &Result<usize, TransportError>) -> String {
    match outcome {
        Ok(sent) => format!("✓ Sent {sent} message(s) over {url}\n✓ WebSocket closed"),
        Err(err) => failure(err),
    }
}

pub fn health(url: &str, status: &HealthStatus) -> String {
    match status {
        HealthStatus::Up { clients } => {
            format!("✓ Server is running at {url}\n✓ Connected clients: {clients}")
        }
        HealthStatus::Down { reason } => format!("✗ {url} is not healthy: {reason}"),
    }
}

/// One line per generated sample: time, angles, then the delivery outcome.
pub fn sample_line(
    at: NaiveTime,
    sample: &AngleSample,
    outcome: &Result<DeliveryReceipt, TransportError>,
) -> String {
    let mark = match outcome {
        Ok(DeliveryReceipt::Reply(reply)) if reply.is_accepted() => "✓".to_owned(),
        Ok(DeliveryReceipt::Reply(reply)) => format!("✓ status {}", reply.status.as_u16()),
        Ok(DeliveryReceipt::Streamed { sequence }) => format!("✓ #{sequence}"),
        Err(err) => format!("✗ {err}"),
    };
    format!(
        "[{}] θ={:7.2}° ψ={:7.2}° φ={:7.2}° {}",
        at.format("%H:%M:%S"),
        sample.theta,
        sample.psi,
        sample.phi,
        mark
    )
}

pub fn report(report: &FeedReport) -> String {
    format!(
        "\n✓ Sent {} sample(s), {} failed",
        report.sent, report.failed
    )
}

fn failure(err: &TransportError) -> String {
    if err.is_connectivity() {
        format!("✗ Connection error: {err}")
    } else {
        format!("✗ Error: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incline_net::StatusCode;
    use incline_sim::AngleTriple;
    use std::time::Duration;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 34, 56).unwrap()
    }

    fn sample() -> AngleSample {
        AngleSample::from_angles(AngleTriple::new(15.5, -22.3, 45.0))
    }

    #[test]
    fn sample_line_aligns_angles() {
        let outcome = Ok(DeliveryReceipt::Reply(RestReply {
            status: StatusCode::OK,
            body: serde_json::Value::Null,
        }));
        assert_eq!(
            sample_line(noon(), &sample(), &outcome),
            "[12:34:56] θ=  15.50° ψ= -22.30° φ=  45.00° ✓"
        );
    }

    #[test]
    fn sample_line_flags_unexpected_status_and_failures() {
        let rejected = Ok(DeliveryReceipt::Reply(RestReply {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: serde_json::Value::Null,
        }));
        assert!(sample_line(noon(), &sample(), &rejected).ends_with("✓ status 500"));

        let failed = Err(TransportError::Timeout {
            url: "http://localhost:3000/api/angles".into(),
            timeout: Duration::from_secs(5),
        });
        let line = sample_line(noon(), &sample(), &failed);
        assert!(line.contains("✗ no response from http://localhost:3000/api/angles"));
    }

    #[test]
    fn health_lines_report_clients_or_reason() {
        let up = health("http://localhost:3000/health", &HealthStatus::Up { clients: 4 });
        assert!(up.ends_with("Connected clients: 4"));

        let down = HealthStatus::Down {
            reason: incline_net::HealthFault::UnexpectedStatus(StatusCode::SERVICE_UNAVAILABLE),
        };
        assert!(health("http://localhost:3000/health", &down).contains("503"));
    }

    #[test]
    fn connectivity_failures_are_labelled() {
        let err = TransportError::Timeout {
            url: "http://localhost:3000/api/angles".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(rest_outcome(&Err(err)).starts_with("✗ Connection error"));
    }
}
