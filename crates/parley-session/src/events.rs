//! The [`SessionEvent`] vocabulary delivered through the event bus.
//!
//! Every variant has a stable name string returned by
//! [`SessionEvent::event_type`]; UI callers subscribe by that name. The
//! names are part of the public API contract — tests pin them exactly.

use chrono::{DateTime, Utc};

use parley_core::ids::{ConversationId, MessageId, UserId};
use parley_core::model::{Conversation, Message, MessageStatus};

/// A state change notified to subscribers.
///
/// Payloads are read-only snapshots — mutating them has no effect on the
/// store.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The transport connection is up.
    Connected,
    /// The transport connection dropped (reconnection may follow).
    Disconnected,
    /// An error surfaced to callers. `fatal` is set only for reconnect
    /// exhaustion, which is emitted exactly once.
    Error {
        /// Human-readable description.
        message: String,
        /// Whether the session has terminally given up reconnecting.
        fatal: bool,
    },
    /// An inbound message was applied to the store.
    MessageReceived(Message),
    /// A local message was appended (optimistic, `sending`).
    MessageSent(Message),
    /// A message's delivery status advanced.
    MessageStatusUpdated {
        /// Target message.
        message_id: MessageId,
        /// Owning conversation.
        conversation_id: ConversationId,
        /// The new status.
        status: MessageStatus,
    },
    /// A message's reactions changed.
    MessageReactionUpdated {
        /// Target message.
        message_id: MessageId,
        /// Owning conversation.
        conversation_id: ConversationId,
        /// The emoji involved.
        emoji: String,
        /// Who reacted.
        user_id: UserId,
        /// `true` if the reaction was removed.
        removed: bool,
    },
    /// A typing indicator changed.
    TypingUpdated {
        /// Conversation the indicator applies to.
        conversation_id: ConversationId,
        /// Whose flag changed.
        user_id: UserId,
        /// The new flag.
        is_typing: bool,
    },
    /// A user's presence changed.
    UserStatusUpdated {
        /// Whose presence changed.
        user_id: UserId,
        /// New online flag.
        online: bool,
        /// Last-seen timestamp, if reported.
        last_seen_at: Option<DateTime<Utc>>,
    },
    /// A conversation was created (locally or via snapshot).
    ConversationCreated(Conversation),
    /// A conversation's state changed (membership, pins, read state, …).
    ConversationUpdated(Conversation),
}

impl SessionEvent {
    /// The subscription name for this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error { .. } => "error",
            Self::MessageReceived(_) => "message_received",
            Self::MessageSent(_) => "message_sent",
            Self::MessageStatusUpdated { .. } => "message_status_updated",
            Self::MessageReactionUpdated { .. } => "message_reaction_updated",
            Self::TypingUpdated { .. } => "typing_updated",
            Self::UserStatusUpdated { .. } => "user_status_updated",
            Self::ConversationCreated(_) => "conversation_created",
            Self::ConversationUpdated(_) => "conversation_updated",
        }
    }
}

/// All session event names, for exhaustive testing.
pub const ALL_EVENT_TYPES: &[&str] = &[
    "connected",
    "disconnected",
    "error",
    "message_received",
    "message_sent",
    "message_status_updated",
    "message_reaction_updated",
    "typing_updated",
    "user_status_updated",
    "conversation_created",
    "conversation_updated",
];

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
