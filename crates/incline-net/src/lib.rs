//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Delivery clients for the inclination monitor."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
//! Transports that push angle samples to the monitoring service under test:
//! a single-shot REST sender, a persistent WebSocket stream and a health
//! probe. Every operation reports its outcome as a value; nothing panics on
//! network faults.

pub mod error;
pub mod feeder;
pub mod health;
pub mod rest;
pub mod websocket;

pub use error::{StreamStage, TransportError};
pub use feeder::{
    feed, generate_circular, generate_random, replay, DeliveryReceipt, FeedReport, SampleSink,
};
pub use health::{HealthFault, HealthProbe, HealthStatus};
pub use reqwest::StatusCode;
pub use rest::{RestReply, RestSender};
pub use websocket::{MonitorSocket, StreamSender, StreamSession};
