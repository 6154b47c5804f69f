//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Persistent WebSocket delivery of angle samples."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
use std::num::NonZeroUsize;
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use incline_common::{StreamConfig, TargetConfig};
use incline_sim::AngleSample;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{endpoint, BoxError, StreamStage, TransportError};

/// Client socket produced by [`StreamSender::open`].
pub type MonitorSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens stream sessions against the monitor's WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct StreamSender {
    url: Url,
    pacing: Duration,
}

impl StreamSender {
    pub fn new(target: &TargetConfig, config: &StreamConfig) -> Result<Self, TransportError> {
        Ok(Self {
            url: endpoint("ws", target, "/")?,
            pacing: config.pacing,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Connect and return an open session. Only the transport's own connect
    /// behaviour bounds how long this may take.
    pub async fn open(&self) -> Result<StreamSession<MonitorSocket>, TransportError> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|err| TransportError::stream(&self.url, StreamStage::Connect, err))?;
        info!(url = %self.url, "stream session opened");
        Ok(StreamSession::new(self.url.clone(), socket, self.pacing))
    }

    /// Send `sample` `count` times over one connection, then close it.
    ///
    /// Stops at the first failed send; the rest of the batch is not attempted.
    pub async fn send_stream(
        &self,
        sample: &AngleSample,
        count: NonZeroUsize,
    ) -> Result<usize, TransportError> {
        let mut session = self.open().await?;
        let sent = session.send_repeated(sample, count).await?;
        session.close().await?;
        Ok(sent)
    }
}

/// One open connection. Messages go out strictly in call order.
///
/// After a failed send the session is abandoned: every later send fails
/// without touching the socket. Closing consumes the session.
pub struct StreamSession<S> {
    url: Url,
    socket: S,
    pacing: Duration,
    sent: usize,
    abandoned: bool,
}

impl<S> StreamSession<S>
where
    S: Sink<Message> + Unpin,
    S::Error: Into<BoxError>,
{
    pub fn new(url: Url, socket: S, pacing: Duration) -> Self {
        Self {
            url,
            socket,
            pacing,
            sent: 0,
            abandoned: false,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Messages sent so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Serialize and send one sample without pacing. Returns its 1-based
    /// sequence number within the session.
    pub async fn send(&mut self, sample: &AngleSample) -> Result<usize, TransportError> {
        if self.abandoned {
            return Err(TransportError::Abandoned {
                url: self.url.to_string(),
            });
        }
        let text = serde_json::to_string(sample)
            .map_err(|err| TransportError::stream(&self.url, StreamStage::Send, err))?;
        if let Err(err) = self.socket.send(Message::Text(text)).await {
            self.abandoned = true;
            let err = TransportError::stream(&self.url, StreamStage::Send, err);
            warn!(url = %self.url, sequence = self.sent + 1, error = %err, "stream send failed");
            return Err(err);
        }
        self.sent += 1;
        debug!(url = %self.url, sequence = self.sent, "sample streamed");
        Ok(self.sent)
    }

    /// Send the same sample `count` times, pausing for the pacing delay
    /// after each message.
    pub async fn send_repeated(
        &mut self,
        sample: &AngleSample,
        count: NonZeroUsize,
    ) -> Result<usize, TransportError> {
        for _ in 0..count.get() {
            self.send(sample).await?;
            sleep(self.pacing).await;
        }
        Ok(count.get())
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<usize, TransportError> {
        self.socket
            .close()
            .await
            .map_err(|err| TransportError::stream(&self.url, StreamStage::Close, err))?;
        info!(url = %self.url, sent = self.sent, "stream session closed");
        Ok(self.sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::{Message as ServerMessage, WebSocket, WebSocketUpgrade};
    use axum::routing::get;
    use axum::Router;
    use futures_util::sink;
    use incline_sim::AngleTriple;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// Mock monitor that forwards every text frame it receives.
    async fn spawn_monitor() -> (TargetConfig, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/",
            get(move |ws: WebSocketUpgrade| {
                let tx = tx.clone();
                async move { ws.on_upgrade(move |socket| forward_frames(socket, tx)) }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (TargetConfig::new("127.0.0.1", addr.port()), rx)
    }

    async fn forward_frames(mut socket: WebSocket, tx: mpsc::UnboundedSender<String>) {
        while let Some(Ok(message)) = socket.recv().await {
            match message {
                ServerMessage::Text(text) => {
                    let _ = tx.send(text);
                }
                ServerMessage::Close(_) => break,
                _ => {}
            }
        }
    }

    fn fast() -> StreamConfig {
        StreamConfig {
            pacing: Duration::from_millis(10),
        }
    }

    fn count(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn streams_count_messages_in_order() {
        let (target, mut frames) = spawn_monitor().await;
        let sender = StreamSender::new(&target, &fast()).unwrap();
        let sample = AngleSample::from_angles(AngleTriple::new(15.5, -22.3, 45.0));

        let sent = sender.send_stream(&sample, count(3)).await.unwrap();
        assert_eq!(sent, 3);

        for _ in 0..3 {
            let text = timeout(Duration::from_secs(1), frames.recv())
                .await
                .unwrap()
                .unwrap();
            let received: AngleSample = serde_json::from_str(&text).unwrap();
            assert_eq!(received, sample);
        }
        assert!(timeout(Duration::from_millis(50), frames.recv())
            .await
            .map_or(true, |frame| frame.is_none()));
    }

    #[tokio::test]
    async fn session_preserves_send_order() {
        let (target, mut frames) = spawn_monitor().await;
        let sender = StreamSender::new(&target, &fast()).unwrap();
        let mut session = sender.open().await.unwrap();
        for theta in [1.0, 2.0, 3.0, 4.0] {
            let sample = AngleSample::from_angles(AngleTriple::new(theta, 0.0, 0.0));
            session.send(&sample).await.unwrap();
        }
        assert_eq!(session.close().await.unwrap(), 4);

        let mut thetas = Vec::new();
        for _ in 0..4 {
            let text = timeout(Duration::from_secs(1), frames.recv())
                .await
                .unwrap()
                .unwrap();
            thetas.push(serde_json::from_str::<AngleSample>(&text).unwrap().theta);
        }
        assert_eq!(thetas, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn failed_send_abandons_the_rest_of_the_batch() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let socket = Box::pin(sink::unfold((), move |(), _message: Message| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt == 2 {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "peer went away",
                    ))
                } else {
                    Ok(())
                }
            }
        }));
        let url = Url::parse("ws://127.0.0.1:3000/").unwrap();
        let mut session = StreamSession::new(url, socket, Duration::from_millis(1));

        let err = session
            .send_repeated(&AngleSample::default(), count(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Stream {
                stage: StreamStage::Send,
                ..
            }
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(session.sent(), 1);
        assert!(session.is_abandoned());

        let again = session.send(&AngleSample::default()).await.unwrap_err();
        assert!(matches!(again, TransportError::Abandoned { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_monitor_fails_at_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sender = StreamSender::new(&TargetConfig::new("127.0.0.1", port), &fast()).unwrap();
        let err = sender
            .send_stream(&AngleSample::default(), count(1))
            .await
            .unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {err}");
    }
}
