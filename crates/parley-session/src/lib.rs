//! # parley-session
//!
//! The messaging session runtime: everything between the wire and the UI.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `config` | Layered `SessionConfig` (defaults → file → `PARLEY_*` env) |
//! | `transport` | `Transport` trait, live WebSocket implementation, test double |
//! | `synthetic` | Offline/demo feed speaking the identical frame contract |
//! | `connection` | Connection state machine, heartbeat, linear-backoff reconnect |
//! | `store` | In-memory conversations/messages with all derived-state rules |
//! | `bus` | Synchronous registration-order publish/subscribe |
//! | `events` | The `SessionEvent` vocabulary delivered through the bus |
//! | `typing` | Outbound typing debounce with auto-stop timers |
//! | `session` | The `MessagingSession` facade UI code depends on |
//!
//! ## Data Flow
//!
//! UI → `session` → `connection` (transmit) or `store` (optimistic local
//! mutation). Inbound: transport frame → codec → dispatch loop → `store`
//! mutation → `bus` notification. Frames are applied one at a time in
//! arrival order; a frame is fully applied before the next is processed.

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod connection;
pub mod events;
pub mod session;
pub mod store;
pub mod synthetic;
pub mod transport;
pub mod typing;

pub use bus::{EventBus, SubscriptionId};
pub use config::SessionConfig;
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState};
pub use events::SessionEvent;
pub use session::MessagingSession;
pub use store::MessageStore;
pub use synthetic::SyntheticTransport;
pub use transport::{ChannelTransport, PeerLink, Transport, TransportLink, WsTransport, channel_pair};
pub use typing::TypingCoordinator;
