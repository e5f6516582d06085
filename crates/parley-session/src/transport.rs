//! Transport seam between the connection manager and the wire.
//!
//! A [`Transport`] produces a [`TransportLink`] per connection attempt: a pair
//! of string channels carrying raw JSON frames plus a cancellation token that
//! trips when the underlying connection dies. The connection manager never
//! touches sockets directly, which is what lets the reconnect and heartbeat
//! machinery run unchanged against [`WsTransport`], the scripted
//! [`ChannelTransport`] used in tests, and the synthetic demo feed.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parley_core::{Result, SessionError};

use crate::config::SessionConfig;

/// Frame channel capacity for a single connection.
const LINK_CAPACITY: usize = 64;

/// One live connection, as seen by the connection manager.
#[derive(Debug)]
pub struct TransportLink {
    /// Raw outbound frames (already-encoded JSON text).
    pub outbound: mpsc::Sender<String>,
    /// Raw inbound frames, one JSON text frame per item.
    pub inbound: mpsc::Receiver<String>,
    /// Cancelled when the connection is gone, whichever side noticed first.
    pub closed: CancellationToken,
}

/// Dials connections. Implementations decide what "the wire" is.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish one connection and hand back its link.
    async fn connect(&self, config: &SessionConfig) -> Result<TransportLink>;

    /// Short name for log lines.
    fn name(&self) -> &'static str;
}

/// Build a connected channel pair: the client-side link and the peer end a
/// server (real or scripted) drives.
pub fn channel_pair() -> (TransportLink, PeerLink) {
    let (out_tx, out_rx) = mpsc::channel(LINK_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel(LINK_CAPACITY);
    let closed = CancellationToken::new();
    let link = TransportLink {
        outbound: out_tx,
        inbound: in_rx,
        closed: closed.clone(),
    };
    let peer = PeerLink {
        to_client: in_tx,
        from_client: out_rx,
        closed,
    };
    (link, peer)
}

/// The far side of a [`channel_pair`].
#[derive(Debug)]
pub struct PeerLink {
    /// Frames pushed here arrive on the client's inbound channel.
    pub to_client: mpsc::Sender<String>,
    /// Frames the client sent.
    pub from_client: mpsc::Receiver<String>,
    /// Shared with the client link; cancel to simulate a dropped connection.
    pub closed: CancellationToken,
}

// ─── WebSocket transport ─────────────────────────────────────────────────────

/// Production transport over `tokio-tungstenite`.
///
/// The socket is split into a reader and a writer task. Either task ending
/// (remote close, IO error, or the link's `closed` token tripping) cancels
/// the token, and the other task drains out behind it.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, config: &SessionConfig) -> Result<TransportLink> {
        let (ws, _) = connect_async(&config.server_url)
            .await
            .map_err(|e| SessionError::transport(format!("connect {}: {e}", config.server_url)))?;
        debug!(url = %config.server_url, "websocket connected");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<String>(LINK_CAPACITY);
        let closed = CancellationToken::new();

        let writer_closed = closed.clone();
        let _ = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = out_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                            warn!(error = %e, "websocket send failed");
                            break;
                        }
                    }
                    () = writer_closed.cancelled() => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            writer_closed.cancel();
        });

        let reader_closed = closed.clone();
        let _ = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = ws_rx.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if in_tx.send(text.to_string()).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("websocket closed by remote");
                                break;
                            }
                            Some(Ok(_)) => {} // binary / ping / pong frames
                            Some(Err(e)) => {
                                warn!(error = %e, "websocket read failed");
                                break;
                            }
                        }
                    }
                    () = reader_closed.cancelled() => break,
                }
            }
            reader_closed.cancel();
        });

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
            closed,
        })
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

// ─── Scripted channel transport ──────────────────────────────────────────────

/// In-process transport for tests.
///
/// Each expected connection attempt is queued ahead of time; `connect` pops
/// the next scripted outcome. An unscripted attempt fails, which keeps
/// reconnect tests deterministic.
#[derive(Default)]
pub struct ChannelTransport {
    scripted: parking_lot::Mutex<std::collections::VecDeque<Result<TransportLink>>>,
}

impl ChannelTransport {
    /// New transport with no scripted connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one successful connection; returns the peer end to drive it.
    pub fn expect_connect(&self) -> PeerLink {
        let (link, peer) = channel_pair();
        self.scripted.lock().push_back(Ok(link));
        peer
    }

    /// Queue one failed connection attempt.
    pub fn expect_failure(&self, message: impl Into<String>) {
        self.scripted
            .lock()
            .push_back(Err(SessionError::transport(message)));
    }

    /// How many scripted outcomes remain unconsumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.scripted.lock().len()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self, _config: &SessionConfig) -> Result<TransportLink> {
        self.scripted
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::transport("no scripted connection")))
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn channel_pair_round_trip() {
        let (mut link, mut peer) = channel_pair();

        peer.to_client.send("{\"type\":\"pong\"}".into()).await.unwrap();
        assert_eq!(link.inbound.recv().await.unwrap(), "{\"type\":\"pong\"}");

        link.outbound.send("{\"type\":\"ping\"}".into()).await.unwrap();
        assert_eq!(peer.from_client.recv().await.unwrap(), "{\"type\":\"ping\"}");
    }

    #[tokio::test]
    async fn channel_pair_shares_closed_token() {
        let (link, peer) = channel_pair();
        assert!(!link.closed.is_cancelled());
        peer.closed.cancel();
        assert!(link.closed.is_cancelled());
    }

    #[tokio::test]
    async fn scripted_outcomes_pop_in_order() {
        let transport = ChannelTransport::new();
        let _peer = transport.expect_connect();
        transport.expect_failure("refused");
        assert_eq!(transport.remaining(), 2);

        let config = SessionConfig::default();
        assert!(transport.connect(&config).await.is_ok());
        let err = transport.connect(&config).await.unwrap_err();
        assert_matches!(err, SessionError::Transport { ref message } if message == "refused");
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn unscripted_connect_fails() {
        let transport = ChannelTransport::new();
        let err = transport.connect(&SessionConfig::default()).await.unwrap_err();
        assert_matches!(err, SessionError::Transport { .. });
    }

    #[tokio::test]
    async fn ws_connect_to_dead_port_is_transport_error() {
        let config = SessionConfig {
            server_url: "ws://127.0.0.1:1/ws".into(),
            ..SessionConfig::default()
        };
        let err = WsTransport.connect(&config).await.unwrap_err();
        assert_matches!(err, SessionError::Transport { .. });
    }

    #[test]
    fn transport_names() {
        assert_eq!(WsTransport.name(), "websocket");
        assert_eq!(ChannelTransport::new().name(), "channel");
    }
}
