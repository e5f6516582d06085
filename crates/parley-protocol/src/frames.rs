//! Typed frame payloads and the closed inbound/outbound type sets.
//!
//! Every variant carries an exact wire string (e.g. `"message_status"`)
//! returned by [`InboundEvent::event_type`] / [`OutboundCommand::command_type`].
//! These strings are the protocol contract — peers and tests depend on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::ids::{ConversationId, MessageId, UserId};
use parley_core::model::{Conversation, Message, MessageStatus, MessageType};

// ─────────────────────────────────────────────────────────────────────────────
// Inbound payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of an inbound `typing` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUpdate {
    /// Conversation the indicator applies to.
    pub conversation_id: ConversationId,
    /// Who is (or stopped) typing.
    pub user_id: UserId,
    /// `true` while composing; `false` clears the indicator.
    pub is_typing: bool,
    /// When the signal was produced.
    pub timestamp: DateTime<Utc>,
}

/// Payload of an inbound `reaction` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    /// Target message.
    pub message_id: MessageId,
    /// Conversation holding the message.
    pub conversation_id: ConversationId,
    /// The emoji.
    pub emoji: String,
    /// Who reacted.
    pub user_id: UserId,
    /// When the reaction was applied.
    pub timestamp: DateTime<Utc>,
    /// `true` when the reaction was removed rather than added.
    #[serde(default)]
    pub removed: bool,
}

/// Payload of an inbound `message_status` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Target message.
    pub message_id: MessageId,
    /// Conversation holding the message.
    pub conversation_id: ConversationId,
    /// New delivery status. Applied monotonically by the store.
    pub status: MessageStatus,
}

/// Payload of an inbound `user_status` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    /// Whose presence changed.
    pub user_id: UserId,
    /// New online flag.
    pub online: bool,
    /// Last-seen timestamp (usually set when going offline).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// An inbound frame, decoded into its typed event.
///
/// The seven variants are the complete inbound vocabulary; a frame with any
/// other `type` string fails to decode.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// A new message arrived.
    Message(Message),
    /// A typing indicator changed.
    Typing(TypingUpdate),
    /// A reaction was added or removed.
    Reaction(ReactionUpdate),
    /// A message's delivery status advanced.
    MessageStatus(StatusUpdate),
    /// A user's presence changed.
    UserStatus(PresenceUpdate),
    /// An authoritative conversation snapshot (membership, settings, pins).
    ConversationUpdate(Conversation),
    /// Heartbeat reply.
    Pong,
}

impl InboundEvent {
    /// The wire `type` string for this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Typing(_) => "typing",
            Self::Reaction(_) => "reaction",
            Self::MessageStatus(_) => "message_status",
            Self::UserStatus(_) => "user_status",
            Self::ConversationUpdate(_) => "conversation_update",
            Self::Pong => "pong",
        }
    }
}

/// All inbound frame type strings, for exhaustive testing.
pub const ALL_INBOUND_TYPES: &[&str] = &[
    "message",
    "typing",
    "reaction",
    "message_status",
    "user_status",
    "conversation_update",
    "pong",
];

// ─────────────────────────────────────────────────────────────────────────────
// Outbound payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of an outbound `typing` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingCommand {
    /// Conversation being typed in.
    pub conversation_id: ConversationId,
    /// Local user producing the signal.
    pub user_id: UserId,
    /// `true` while composing.
    pub is_typing: bool,
}

/// Payload of an outbound `mark_read` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    /// Conversation being marked read.
    pub conversation_id: ConversationId,
    /// Newest message covered by the receipt.
    pub message_id: MessageId,
}

/// Payload of outbound commands that target one message
/// (`add_reaction` / `remove_reaction` / `delete_message`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRefPayload {
    /// Target message.
    pub message_id: MessageId,
    /// Conversation holding the message.
    pub conversation_id: ConversationId,
    /// Acting user.
    pub user_id: UserId,
    /// Emoji, for reaction commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

/// Payload of an outbound `edit_message` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPayload {
    /// Target message.
    pub message_id: MessageId,
    /// Conversation holding the message.
    pub conversation_id: ConversationId,
    /// Replacement content.
    pub content: String,
}

/// Payload of an outbound `send_message` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Client-minted message ID (the server echoes it in status frames).
    pub message_id: MessageId,
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Author (the local user).
    pub sender_id: UserId,
    /// Body.
    pub content: String,
    /// Content type.
    #[serde(default)]
    pub message_type: MessageType,
    /// Local creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SendMessagePayload {
    /// Build the command payload from a locally appended message.
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            message_type: message.message_type,
            created_at: message.created_at,
        }
    }
}

/// An outbound command, encoded into a wire frame before transmission.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundCommand {
    /// Send a new message.
    SendMessage(SendMessagePayload),
    /// Start or stop a typing indicator.
    Typing(TypingCommand),
    /// Add a reaction.
    AddReaction(MessageRefPayload),
    /// Remove a reaction.
    RemoveReaction(MessageRefPayload),
    /// Mark a conversation read up to a message.
    MarkRead(MarkReadPayload),
    /// Delete a message.
    DeleteMessage(MessageRefPayload),
    /// Edit a message's content.
    EditMessage(EditPayload),
    /// Heartbeat.
    Ping,
}

impl OutboundCommand {
    /// The wire `type` string for this command.
    #[must_use]
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "send_message",
            Self::Typing(_) => "typing",
            Self::AddReaction(_) => "add_reaction",
            Self::RemoveReaction(_) => "remove_reaction",
            Self::MarkRead(_) => "mark_read",
            Self::DeleteMessage(_) => "delete_message",
            Self::EditMessage(_) => "edit_message",
            Self::Ping => "ping",
        }
    }
}

/// All outbound command type strings, for exhaustive testing.
pub const ALL_OUTBOUND_TYPES: &[&str] = &[
    "send_message",
    "typing",
    "add_reaction",
    "remove_reaction",
    "mark_read",
    "delete_message",
    "edit_message",
    "ping",
];

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
