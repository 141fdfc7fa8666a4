//! One WebSocket leg: dial, read pump, write pump.
//!
//! The read pump enforces the silence window and feeds the inbound queue;
//! the write pump owns the sink and is the only task that writes to the
//! transport: queued messages, keepalive pings, and the close frame on
//! teardown. Every failure path funnels through the leg's cancellation
//! token, so teardown stays idempotent however many loops observe the
//! failure.

use std::time::Duration;

use async_tungstenite::tokio::{connect_async_with_config, ConnectStream};
use async_tungstenite::WebSocketStream;
use culvert_core::session::{Leg, Role, QUEUE_CAPACITY};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::Uri;
use tungstenite::protocol::WebSocketConfig;
use tungstenite::Message;

use crate::credentials::Credentials;
use crate::error::DialError;

/// Maximum in-flight message size, either direction.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Tuning for one leg's pumps.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Keepalive probe interval.
    pub ping_interval: Duration,
    /// Allowed silence since the last pong before the leg is declared dead.
    pub silence_window: Duration,
    /// Per-write deadline.
    pub write_deadline: Duration,
    /// The handshake must complete within this.
    pub handshake_timeout: Duration,
    /// Maximum message size, enforced in both pumps.
    pub max_message_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(5),
            silence_window: Duration::from_secs(60),
            write_deadline: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(45),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

type Source = SplitStream<WebSocketStream<ConnectStream>>;
type Sink = SplitSink<WebSocketStream<ConnectStream>, Message>;

/// Dial `uri` and start the leg's pumps.
///
/// The returned [`Leg`]'s teardown token is a child of `shutdown`;
/// cancelling either tears the connection down exactly once.
///
/// # Errors
///
/// Returns [`DialError`] if the handshake fails or times out.
pub async fn dial(
    uri: &Uri,
    role: Role,
    credentials: &Credentials,
    config: &SocketConfig,
    shutdown: &CancellationToken,
) -> Result<Leg, DialError> {
    tracing::info!(%role, %uri, "connecting");

    let mut request = uri.clone().into_client_request()?;
    credentials.apply(request.headers_mut());

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);

    let (stream, _response) = match timeout(
        config.handshake_timeout,
        connect_async_with_config(request, Some(ws_config)),
    )
    .await
    {
        Ok(connected) => connected?,
        Err(_) => return Err(DialError::HandshakeTimeout),
    };
    tracing::info!(%role, "connected");

    let (sink, source) = stream.split();
    let (outbound_tx, outbound_rx) = async_channel::bounded(QUEUE_CAPACITY);
    let (inbound_tx, inbound_rx) = async_channel::bounded(QUEUE_CAPACITY);
    let teardown = shutdown.child_token();

    tokio::spawn(read_pump(
        role,
        source,
        inbound_tx,
        teardown.clone(),
        config.clone(),
    ));
    tokio::spawn(write_pump(
        role,
        sink,
        outbound_rx,
        teardown.clone(),
        config.clone(),
    ));

    Ok(Leg::new(role, outbound_tx, inbound_rx, teardown))
}

async fn read_pump(
    role: Role,
    mut source: Source,
    inbound: async_channel::Sender<String>,
    teardown: CancellationToken,
    config: SocketConfig,
) {
    let mut deadline = Instant::now() + config.silence_window;

    loop {
        let next = tokio::select! {
            () = teardown.cancelled() => break,
            next = timeout_at(deadline, source.next()) => next,
        };

        let message = match next {
            Err(_) => {
                tracing::warn!(%role, "no pong within the silence window, tearing down");
                break;
            }
            Ok(None) => {
                tracing::info!(%role, "connection closed by peer");
                break;
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(%role, error = %e, "read failed");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                if text.len() > config.max_message_size {
                    tracing::warn!(%role, size = text.len(), "oversized message, tearing down");
                    break;
                }
                let delivered = tokio::select! {
                    () = teardown.cancelled() => break,
                    delivered = inbound.send(text) => delivered,
                };
                if delivered.is_err() {
                    break;
                }
            }
            Message::Pong(_) => {
                deadline = Instant::now() + config.silence_window;
            }
            Message::Ping(payload) => {
                // tungstenite queues the pong reply itself, and its read
                // path writes queued control frames on every poll, so the
                // reply goes out as this pump keeps polling `next()`. If
                // that write ever blocks, the keepalive tick flushes the
                // sink within one ping interval, well inside the peer's
                // silence window.
                tracing::trace!(%role, len = payload.len(), "ping");
            }
            Message::Binary(_) => {
                tracing::warn!(%role, "unexpected binary message");
            }
            Message::Close(_) => {
                tracing::info!(%role, "close frame received");
                break;
            }
            Message::Frame(_) => {
                tracing::warn!(%role, "unexpected raw frame");
            }
        }
    }

    teardown.cancel();
    tracing::debug!(%role, "read pump stopped");
}

async fn write_pump(
    role: Role,
    mut sink: Sink,
    outbound: async_channel::Receiver<String>,
    teardown: CancellationToken,
    config: SocketConfig,
) {
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );

    loop {
        tokio::select! {
            () = teardown.cancelled() => {
                let _ = timeout(config.write_deadline, sink.send(Message::Close(None))).await;
                break;
            }
            message = outbound.recv() => match message {
                Ok(text) => {
                    if text.len() > config.max_message_size {
                        tracing::warn!(%role, size = text.len(), "oversized outbound message, tearing down");
                        break;
                    }
                    match timeout(config.write_deadline, sink.send(Message::Text(text))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::warn!(%role, error = %e, "write failed");
                            break;
                        }
                        Err(_) => {
                            tracing::warn!(%role, "write deadline missed");
                            break;
                        }
                    }
                }
                // Queue closed: whoever fed this leg is gone.
                Err(_) => {
                    let _ = timeout(config.write_deadline, sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = keepalive.tick() => {
                match timeout(config.write_deadline, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(%role, error = %e, "ping failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(%role, "ping deadline missed");
                        break;
                    }
                }
            }
        }
    }

    teardown.cancel();
    let _ = timeout(config.write_deadline, sink.close()).await;
    tracing::debug!(%role, "write pump stopped");
}
