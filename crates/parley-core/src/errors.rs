//! Error taxonomy for the messaging session core.
//!
//! [`SessionError`] is the primary error type across the workspace. The
//! propagation policy is deliberately asymmetric:
//!
//! - `Transport` and `Decode` failures are recovered internally — they drive
//!   the reconnect state machine or drop the offending frame, and are never
//!   thrown up the public API call stack.
//! - `UnknownConversation` / `UnknownMessage` are logged-and-dropped for
//!   inbound frames, but surfaced to the caller when a public API call
//!   targets a missing entity.
//! - `ReconnectExhausted` is terminal and reaches callers once, via the
//!   event bus `error` event.

use thiserror::Error;

use crate::ids::{ConversationId, MessageId};

/// Errors produced by the messaging session core.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport connection failed or dropped.
    ///
    /// Triggers a reconnect transition; not surfaced as a thrown error.
    #[error("transport error: {message}")]
    Transport {
        /// What the transport reported.
        message: String,
    },

    /// An inbound frame could not be decoded.
    ///
    /// The frame is logged and dropped; the connection stays open.
    #[error("decode error: {message}")]
    Decode {
        /// Why decoding failed.
        message: String,
    },

    /// A frame or API call referenced a conversation not present locally.
    ///
    /// Conversation membership must be established before messages flow;
    /// the core never auto-creates a conversation from an inbound message.
    #[error("unknown conversation: {0}")]
    UnknownConversation(ConversationId),

    /// A frame or API call referenced a message not present locally.
    #[error("unknown message: {0}")]
    UnknownMessage(MessageId),

    /// Reconnect attempts were exhausted; the connection is terminally down.
    ///
    /// Emitted exactly once via the event bus. An explicit restart is
    /// required to leave this state.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted {
        /// How many attempts were made.
        attempts: u32,
    },

    /// The session has been disconnected and accepts no further operations.
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Wrap a transport-level failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Wrap a frame decode failure.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether this error is recovered inside the core (never thrown to the
    /// UI call stack).
    #[must_use]
    pub fn is_recovered_internally(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Decode { .. })
    }
}

/// Convenience result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn transport_constructor() {
        let err = SessionError::transport("connection refused");
        assert_matches!(err, SessionError::Transport { ref message } if message == "connection refused");
        assert!(err.is_recovered_internally());
    }

    #[test]
    fn decode_constructor() {
        let err = SessionError::decode("bad frame");
        assert!(err.is_recovered_internally());
        assert_eq!(err.to_string(), "decode error: bad frame");
    }

    #[test]
    fn unknown_conversation_display() {
        let err = SessionError::UnknownConversation(ConversationId::from("c-404"));
        assert_eq!(err.to_string(), "unknown conversation: c-404");
        assert!(!err.is_recovered_internally());
    }

    #[test]
    fn reconnect_exhausted_display() {
        let err = SessionError::ReconnectExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "reconnect attempts exhausted after 5 tries");
        assert!(!err.is_recovered_internally());
    }

    #[test]
    fn closed_display() {
        assert_eq!(SessionError::Closed.to_string(), "session is closed");
    }
}
