//! Connection lifecycle: state machine, heartbeat, linear-backoff reconnect.
//!
//! The manager runs as one spawned task owning the transport link, a
//! heartbeat ticker (alive only while `Connected`), and the reconnect
//! schedule. Decoded inbound events flow out through a channel the session
//! dispatch loop consumes; lifecycle transitions (`connected`,
//! `disconnected`, fatal `error`) are published straight to the event bus.
//!
//! State machine:
//!
//! ```text
//! Disconnected → Connecting → Connected → Reconnecting ⤸
//!                    ↑                         │
//!                    └───── backoff delay ─────┘
//! ```
//!
//! `Reconnecting → Disconnected` is terminal: after `max_attempts` failed
//! attempts a single fatal error event is emitted and nothing more is
//! scheduled until an explicit restart.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use parley_core::{Result, SessionError};
use parley_protocol::codec::{decode_frame, encode_command};
use parley_protocol::frames::{InboundEvent, OutboundCommand};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::events::SessionEvent;
use crate::transport::{Transport, TransportLink};

/// Channel capacity for commands and decoded events.
const CHANNEL_CAPACITY: usize = 64;

/// Where the connection currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying. Terminal after reconnect exhaustion.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The link is up; heartbeat is running.
    Connected,
    /// The link dropped; waiting out the backoff delay.
    Reconnecting,
}

/// Why the connected phase ended.
#[derive(Debug, PartialEq, Eq)]
enum ConnectedExit {
    /// The link died; reconnection should follow.
    Dropped,
    /// An external shutdown was requested.
    Shutdown,
}

/// Owns the transport and drives the connection lifecycle.
pub struct ConnectionManager {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    bus: Arc<EventBus>,
}

/// Caller-side handle to a spawned [`ConnectionManager`].
pub struct ConnectionHandle {
    commands: mpsc::Sender<OutboundCommand>,
    inbound: Option<mpsc::Receiver<InboundEvent>>,
    state: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager for the given transport.
    #[must_use]
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            transport,
            bus,
        }
    }

    /// Spawn the connection task and return its handle.
    #[must_use]
    pub fn spawn(self) -> ConnectionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();

        let _ = tokio::spawn(run(self, cmd_rx, event_tx, state_tx, shutdown.clone()));

        ConnectionHandle {
            commands: cmd_tx,
            inbound: Some(event_rx),
            state: state_rx,
            shutdown,
        }
    }
}

impl ConnectionHandle {
    /// Transmit one outbound command.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] if the connection task has exited.
    pub async fn send(&self, command: OutboundCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// A clone of the command sender, for collaborators that transmit on
    /// their own (the typing coordinator).
    #[must_use]
    pub fn command_sender(&self) -> mpsc::Sender<OutboundCommand> {
        self.commands.clone()
    }

    /// Take the decoded inbound event stream. Yields `None` after the first
    /// call — there is exactly one dispatch loop.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<InboundEvent>> {
        self.inbound.take()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A watch receiver over lifecycle state, for awaiting transitions.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Whether the link is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Tear the connection down: cancels the heartbeat and any pending
    /// reconnect attempt. The state settles in `Disconnected`.
    pub fn disconnect(&self) {
        self.shutdown.cancel();
    }
}

/// The connection task. Cycles connect → connected → backoff until shutdown
/// or reconnect exhaustion.
async fn run(
    manager: ConnectionManager,
    mut cmd_rx: mpsc::Receiver<OutboundCommand>,
    event_tx: mpsc::Sender<InboundEvent>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
) {
    let ConnectionManager {
        config,
        transport,
        bus,
    } = manager;
    let policy = config.reconnect.clone();
    // 1-based attempt number for the *next* reconnect; reset on every
    // successful connect.
    let mut attempt: u32 = 0;

    loop {
        let _ = state_tx.send(ConnectionState::Connecting);
        debug!(transport = transport.name(), "connecting");

        // The dial is pinned once and polled across the drain loop, so
        // commands arriving mid-connect are dropped without aborting it.
        let link = {
            let connect = transport.connect(&config);
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    result = &mut connect => break result,
                    // Commands sent while down are dropped, not queued for replay.
                    Some(command) = cmd_rx.recv() => {
                        trace!(command = command.command_type(), "dropping command while connecting");
                    }
                    () = shutdown.cancelled() => {
                        let _ = state_tx.send(ConnectionState::Disconnected);
                        return;
                    }
                }
            }
        };

        match link {
            Ok(link) => {
                attempt = 0;
                counter!("session_connects_total").increment(1);
                info!(transport = transport.name(), "connected");
                let _ = state_tx.send(ConnectionState::Connected);
                bus.emit(&SessionEvent::Connected);

                let exit = run_connected(
                    link,
                    &mut cmd_rx,
                    &event_tx,
                    Duration::from_millis(config.heartbeat_interval_ms),
                    &shutdown,
                )
                .await;

                let _ = state_tx.send(ConnectionState::Reconnecting);
                bus.emit(&SessionEvent::Disconnected);
                if exit == ConnectedExit::Shutdown {
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    return;
                }
                counter!("session_disconnects_total").increment(1);
            }
            Err(e) => {
                warn!(error = %e, "connect attempt failed");
                let _ = state_tx.send(ConnectionState::Reconnecting);
            }
        }

        // Schedule the next attempt: increment first, then check exhaustion.
        attempt += 1;
        if policy.is_exhausted(attempt) {
            let error = SessionError::ReconnectExhausted {
                attempts: policy.max_attempts,
            };
            warn!(attempts = policy.max_attempts, "reconnect attempts exhausted");
            counter!("session_reconnect_exhausted_total").increment(1);
            bus.emit(&SessionEvent::Error {
                message: error.to_string(),
                fatal: true,
            });
            let _ = state_tx.send(ConnectionState::Disconnected);
            return;
        }

        let delay = policy.delay_for_attempt(attempt);
        debug!(attempt, ?delay, "scheduling reconnect");
        counter!("session_reconnect_attempts_total").increment(1);

        let waited = tokio::time::sleep(delay);
        tokio::pin!(waited);
        loop {
            tokio::select! {
                () = &mut waited => break,
                Some(command) = cmd_rx.recv() => {
                    trace!(command = command.command_type(), "dropping command while reconnecting");
                }
                () = shutdown.cancelled() => {
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    return;
                }
            }
        }
    }
}

/// The connected phase: heartbeat, command transmission, frame decoding.
///
/// The heartbeat ticker lives on this function's stack, so it is released on
/// every exit path from `Connected` without a separate cancellation step.
async fn run_connected(
    mut link: TransportLink,
    cmd_rx: &mut mpsc::Receiver<OutboundCommand>,
    event_tx: &mpsc::Sender<InboundEvent>,
    heartbeat_interval: Duration,
    shutdown: &CancellationToken,
) -> ConnectedExit {
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + heartbeat_interval,
        heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                trace!("heartbeat ping");
                counter!("session_pings_total").increment(1);
                if !transmit(&link, &OutboundCommand::Ping).await {
                    return ConnectedExit::Dropped;
                }
            }
            command = cmd_rx.recv() => {
                let Some(command) = command else {
                    // All handles dropped; treat as shutdown.
                    link.closed.cancel();
                    return ConnectedExit::Shutdown;
                };
                if !transmit(&link, &command).await {
                    return ConnectedExit::Dropped;
                }
            }
            frame = link.inbound.recv() => {
                let Some(raw) = frame else {
                    debug!("inbound stream ended");
                    return ConnectedExit::Dropped;
                };
                match decode_frame(&raw) {
                    Ok(InboundEvent::Pong) => trace!("heartbeat pong"),
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            link.closed.cancel();
                            return ConnectedExit::Shutdown;
                        }
                    }
                    // Decode failures drop the frame; the connection stays up.
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable frame");
                        counter!("session_decode_errors_total").increment(1);
                    }
                }
            }
            () = link.closed.cancelled() => {
                debug!("transport link closed");
                return ConnectedExit::Dropped;
            }
            () = shutdown.cancelled() => {
                link.closed.cancel();
                return ConnectedExit::Shutdown;
            }
        }
    }
}

/// Encode and send one command over the link. Returns `false` if the link is
/// gone; encode failures only drop the command.
async fn transmit(link: &TransportLink, command: &OutboundCommand) -> bool {
    match encode_command(command) {
        Ok(frame) => link.outbound.send(frame).await.is_ok(),
        Err(e) => {
            warn!(error = %e, command = command.command_type(), "failed to encode command");
            true
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
