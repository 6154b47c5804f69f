//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Drives generated or replayed samples into a delivery sink."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
//! Generation and delivery are interleaved: each sample is delivered before
//! the next one is produced. Failed deliveries are counted and the run
//! continues.
use std::pin::pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, Stream, StreamExt};
use incline_sim::{
    AngleSample, BridgeReplay, CircularMotion, GenerationSession, RandomNoise, SimulationError,
};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::error::{BoxError, TransportError};
use crate::rest::{RestReply, RestSender};
use crate::websocket::StreamSession;

/// What a successful delivery produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryReceipt {
    /// REST round trip, with whatever status the monitor chose.
    Reply(RestReply),
    /// Streamed message and its sequence number within the session.
    Streamed { sequence: usize },
}

/// Anything a feed can deliver samples to.
#[async_trait]
pub trait SampleSink: Send {
    async fn deliver(&mut self, sample: &AngleSample) -> Result<DeliveryReceipt, TransportError>;

    /// Destination used in logs.
    fn destination(&self) -> String;
}

#[async_trait]
impl SampleSink for RestSender {
    async fn deliver(&mut self, sample: &AngleSample) -> Result<DeliveryReceipt, TransportError> {
        self.send_single(sample).await.map(DeliveryReceipt::Reply)
    }

    fn destination(&self) -> String {
        self.url().to_string()
    }
}

#[async_trait]
impl<S> SampleSink for StreamSession<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Into<BoxError>,
{
    async fn deliver(&mut self, sample: &AngleSample) -> Result<DeliveryReceipt, TransportError> {
        self.send(sample)
            .await
            .map(|sequence| DeliveryReceipt::Streamed { sequence })
    }

    fn destination(&self) -> String {
        self.url().to_string()
    }
}

/// Delivery counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub sent: u64,
    pub failed: u64,
}

impl FeedReport {
    pub fn total(&self) -> u64 {
        self.sent + self.failed
    }

    fn record<T, E>(&mut self, outcome: &Result<T, E>) {
        match outcome {
            Ok(_) => self.sent += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Deliver every sample from `samples` to `sink`, in order.
///
/// `observe` sees each sample together with its delivery outcome.
pub async fn feed<St, K, F>(samples: St, sink: &mut K, mut observe: F) -> FeedReport
where
    St: Stream<Item = AngleSample>,
    K: SampleSink + ?Sized,
    F: FnMut(&AngleSample, &Result<DeliveryReceipt, TransportError>),
{
    let mut samples = pin!(samples);
    let mut report = FeedReport::default();
    while let Some(sample) = samples.next().await {
        let outcome = sink.deliver(&sample).await;
        if let Err(err) = &outcome {
            warn!(destination = %sink.destination(), error = %err, "sample delivery failed");
        }
        report.record(&outcome);
        observe(&sample, &outcome);
    }
    info!(
        destination = %sink.destination(),
        sent = report.sent,
        failed = report.failed,
        "feed finished"
    );
    report
}

/// Run the circular motion model for `duration`, delivering every sample.
pub async fn generate_circular<K, F>(
    sink: &mut K,
    duration: Duration,
    interval: Duration,
    observe: F,
) -> Result<FeedReport, SimulationError>
where
    K: SampleSink + ?Sized,
    F: FnMut(&AngleSample, &Result<DeliveryReceipt, TransportError>),
{
    let session = GenerationSession::new(CircularMotion::new(duration, interval)?, duration, interval)?;
    info!(?duration, ?interval, "circular generation started");
    Ok(feed(session.into_stream(), sink, observe).await)
}

/// Run uniform random noise within `±max_angle` for `duration`.
pub async fn generate_random<K, F>(
    sink: &mut K,
    duration: Duration,
    interval: Duration,
    max_angle: f64,
    seed: Option<u64>,
    observe: F,
) -> Result<FeedReport, SimulationError>
where
    K: SampleSink + ?Sized,
    F: FnMut(&AngleSample, &Result<DeliveryReceipt, TransportError>),
{
    let session = GenerationSession::new(RandomNoise::new(max_angle, seed)?, duration, interval)?;
    info!(?duration, ?interval, max_angle, seeded = seed.is_some(), "random generation started");
    Ok(feed(session.into_stream(), sink, observe).await)
}

/// Replay a bridge capture, one sample every `interval`.
pub async fn replay<K, F>(
    sink: &mut K,
    capture: BridgeReplay,
    interval: Duration,
    observe: F,
) -> Result<FeedReport, SimulationError>
where
    K: SampleSink + ?Sized,
    F: FnMut(&AngleSample, &Result<DeliveryReceipt, TransportError>),
{
    if interval.is_zero() {
        return Err(SimulationError::ZeroInterval);
    }
    info!(readings = capture.readings().len(), skipped = capture.skipped(), "bridge replay started");
    Ok(feed(capture.into_stream(interval), sink, observe).await)
}
