//! # parley-core
//!
//! Foundation types for the Parley real-time messaging core:
//!
//! - [`ids`]: Branded ID newtypes (`UserId`, `ConversationId`, `MessageId`)
//! - [`model`]: Users, messages, conversations, and their derived state
//! - [`errors`]: The [`SessionError`](errors::SessionError) taxonomy
//! - [`backoff`]: Reconnect policy and linear backoff math
//! - [`logging`]: Tracing subscriber setup
//!
//! Everything here is transport-agnostic and sync — the async session
//! machinery lives in `parley-session`.

#![deny(unsafe_code)]

pub mod backoff;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod model;

pub use backoff::ReconnectPolicy;
pub use errors::{Result, SessionError};
pub use ids::{ConversationId, MessageId, UserId};
pub use model::{
    Attachment, Conversation, ConversationKind, ConversationSettings, Message, MessageStatus,
    MessageType, Reaction, User,
};
