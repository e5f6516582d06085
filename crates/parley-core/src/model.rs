//! The Parley conversation data model.
//!
//! [`Conversation`] and [`Message`] form the in-memory working set owned by
//! the session's message store. Everything serializes with camelCase field
//! names matching the wire format, so the same structs double as frame
//! payloads in `parley-protocol`.
//!
//! Derived state rules live here:
//! - [`MessageStatus`] is ordered and only ever advances
//!   (`sending → sent → delivered → read`).
//! - A deleted message becomes a tombstone: the entry is retained (reply-to
//!   chains stay resolvable) but is excluded from `lastMessage`.
//! - `Conversation::recompute_last_message` derives the latest non-deleted
//!   message rather than caching one that can go stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{ConversationId, MessageId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A participant in one or more conversations.
///
/// Users are identified by [`UserId`]; the same user may appear in many
/// conversations. Presence fields are mutated in place as `user_status`
/// frames arrive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub display_name: String,
    /// Avatar image reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Whether the user is currently online.
    #[serde(default)]
    pub online: bool,
    /// When the user was last seen, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a user with just an ID and display name.
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
            online: false,
            last_seen_at: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// Content type of a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// Image attachment.
    Image,
    /// Generic file attachment.
    File,
    /// Audio clip.
    Audio,
    /// Video clip.
    Video,
    /// Sticker.
    Sticker,
    /// Animated GIF.
    Gif,
}

/// Delivery status of a message.
///
/// The derived `Ord` follows the delivery pipeline, so
/// `MessageStatus::Sending < MessageStatus::Read`. Transitions are one-way;
/// use [`MessageStatus::advance`] to enforce monotonicity.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Appended locally, not yet acknowledged by the server.
    #[default]
    Sending,
    /// Accepted by the server.
    Sent,
    /// Delivered to the recipient's device.
    Delivered,
    /// Read by the recipient.
    Read,
}

impl MessageStatus {
    /// Advance to `next` if it is a forward transition.
    ///
    /// Returns `true` if the status changed. Backward transitions (e.g.
    /// `delivered → sending`) are ignored and return `false` — status never
    /// regresses.
    pub fn advance(&mut self, next: MessageStatus) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// A single emoji reaction on a message.
///
/// A message holds at most one reaction per `(user_id, emoji)` pair;
/// re-adding the same pair replaces the timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// The emoji.
    pub emoji: String,
    /// Who reacted.
    pub user_id: UserId,
    /// When the reaction was (last) applied.
    pub reacted_at: DateTime<Utc>,
}

/// A file attached to a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Download URL.
    pub url: String,
}

/// A message within a conversation.
///
/// `conversation_id` is immutable after creation — a message belongs to
/// exactly one conversation for its whole life.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Message body. Cleared when the message is deleted.
    pub content: String,
    /// Content type.
    #[serde(default)]
    pub message_type: MessageType,
    /// Delivery status.
    #[serde(default)]
    pub status: MessageStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Message this one replies to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    /// Reactions, at most one per (user, emoji) pair.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    /// Attached files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// When the content was last edited, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// When the message was deleted, if it was. Set once; terminal for edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a new outbound message in `sending` state.
    #[must_use]
    pub fn outgoing(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            content: content.into(),
            message_type,
            status: MessageStatus::Sending,
            created_at: Utc::now(),
            reply_to: None,
            reactions: Vec::new(),
            attachments: Vec::new(),
            edited_at: None,
            deleted_at: None,
        }
    }

    /// Whether this message has been deleted (is a tombstone).
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Mark the message deleted, clearing its content.
    ///
    /// The entry is retained as a tombstone so reply-to references and
    /// ordering stay consistent. No-op if already deleted.
    pub fn delete(&mut self, at: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(at);
            self.content.clear();
        }
    }

    /// Replace the content and stamp `edited_at`.
    ///
    /// Returns `false` (and leaves the message untouched) if it has been
    /// deleted — tombstones accept no edits.
    pub fn edit(&mut self, new_content: impl Into<String>, at: DateTime<Utc>) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.content = new_content.into();
        self.edited_at = Some(at);
        true
    }

    /// Apply a reaction, replacing any existing one for the same
    /// `(user, emoji)` pair.
    pub fn apply_reaction(&mut self, reaction: Reaction) {
        self.reactions
            .retain(|r| !(r.user_id == reaction.user_id && r.emoji == reaction.emoji));
        self.reactions.push(reaction);
    }

    /// Remove the reaction for a `(user, emoji)` pair, if present.
    ///
    /// Returns `true` if a reaction was removed.
    pub fn remove_reaction(&mut self, user_id: &UserId, emoji: &str) -> bool {
        let before = self.reactions.len();
        self.reactions
            .retain(|r| !(r.user_id == *user_id && r.emoji == emoji));
        self.reactions.len() != before
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a conversation is one-to-one or a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// One-to-one.
    #[default]
    Direct,
    /// Multi-party.
    Group,
}

/// Per-conversation presentation settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSettings {
    /// Theme identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Nickname overrides keyed by user ID.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub nicknames: HashMap<UserId, String>,
    /// Custom quick-reaction emoji.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_emoji: Option<String>,
}

/// A conversation and its derived state.
///
/// Conversations are never deleted by the session core. `last_message` and
/// `unread_count` are derived fields maintained by the message store; the
/// typing map holds ephemeral per-user flags fed by inbound typing frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation ID.
    pub id: ConversationId,
    /// Direct or group.
    #[serde(default)]
    pub kind: ConversationKind,
    /// Display name (groups; direct conversations derive one in the UI).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Participants. Identity is by user ID; users are shared across
    /// conversations.
    pub participants: Vec<User>,
    /// Most recent non-deleted message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    /// Messages received and not yet read locally.
    #[serde(default)]
    pub unread_count: u32,
    /// Ephemeral per-user typing flags.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub typing: HashMap<UserId, bool>,
    /// Whether notifications are muted.
    #[serde(default)]
    pub muted: bool,
    /// Whether the conversation is pinned to the top of the list.
    #[serde(default)]
    pub pinned: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp — drives list ordering.
    pub updated_at: DateTime<Utc>,
    /// Presentation settings.
    #[serde(default)]
    pub settings: ConversationSettings,
}

impl Conversation {
    /// Create a new conversation with the given participants.
    #[must_use]
    pub fn new(participants: Vec<User>, kind: ConversationKind, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            kind,
            name,
            participants,
            last_message: None,
            unread_count: 0,
            typing: HashMap::new(),
            muted: false,
            pinned: false,
            created_at: now,
            updated_at: now,
            settings: ConversationSettings::default(),
        }
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Recompute `last_message` from the full message list.
    ///
    /// The result is the highest-`created_at` non-deleted message, or `None`
    /// if every message is a tombstone. Always derived from scratch — never
    /// patched incrementally — so it cannot drift.
    pub fn recompute_last_message(&mut self, messages: &[Message]) {
        self.last_message = messages
            .iter()
            .filter(|m| !m.is_deleted())
            .max_by_key(|m| m.created_at)
            .cloned();
    }

    /// Set a participant's typing flag.
    pub fn set_typing(&mut self, user_id: UserId, is_typing: bool) {
        if is_typing {
            let _ = self.typing.insert(user_id, true);
        } else {
            let _ = self.typing.remove(&user_id);
        }
    }

    /// Whether anyone (other than `except`) is currently typing.
    #[must_use]
    pub fn anyone_typing(&self, except: Option<&UserId>) -> bool {
        self.typing
            .iter()
            .any(|(user, &flag)| flag && Some(user) != except)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn message_at(conv: &ConversationId, secs: i64) -> Message {
        let mut m = Message::outgoing(conv.clone(), UserId::from("u1"), "hi", MessageType::Text);
        m.created_at = ts(secs);
        m
    }

    // -- MessageStatus --

    #[test]
    fn status_ordering_follows_pipeline() {
        assert!(MessageStatus::Sending < MessageStatus::Sent);
        assert!(MessageStatus::Sent < MessageStatus::Delivered);
        assert!(MessageStatus::Delivered < MessageStatus::Read);
    }

    #[test]
    fn status_advances_forward() {
        let mut status = MessageStatus::Sending;
        assert!(status.advance(MessageStatus::Sent));
        assert_eq!(status, MessageStatus::Sent);
        assert!(status.advance(MessageStatus::Read));
        assert_eq!(status, MessageStatus::Read);
    }

    #[test]
    fn status_never_regresses() {
        let mut status = MessageStatus::Delivered;
        assert!(!status.advance(MessageStatus::Sending));
        assert!(!status.advance(MessageStatus::Sent));
        assert!(!status.advance(MessageStatus::Delivered));
        assert_eq!(status, MessageStatus::Delivered);
    }

    #[test]
    fn status_can_skip_intermediate_states() {
        // A read receipt can arrive before the delivered receipt.
        let mut status = MessageStatus::Sending;
        assert!(status.advance(MessageStatus::Read));
        assert_eq!(status, MessageStatus::Read);
    }

    #[test]
    fn status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&MessageStatus::Delivered).unwrap(),
            "\"delivered\""
        );
        let back: MessageStatus = serde_json::from_str("\"read\"").unwrap();
        assert_eq!(back, MessageStatus::Read);
    }

    #[test]
    fn message_type_serde_lowercase() {
        assert_eq!(serde_json::to_string(&MessageType::Gif).unwrap(), "\"gif\"");
        let back: MessageType = serde_json::from_str("\"sticker\"").unwrap();
        assert_eq!(back, MessageType::Sticker);
    }

    // -- Message reactions --

    #[test]
    fn reaction_replaces_same_user_emoji_pair() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        msg.apply_reaction(Reaction {
            emoji: "👍".into(),
            user_id: UserId::from("u2"),
            reacted_at: ts(10),
        });
        msg.apply_reaction(Reaction {
            emoji: "👍".into(),
            user_id: UserId::from("u2"),
            reacted_at: ts(20),
        });

        assert_eq!(msg.reactions.len(), 1);
        assert_eq!(msg.reactions[0].reacted_at, ts(20));
    }

    #[test]
    fn different_users_same_emoji_coexist() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        msg.apply_reaction(Reaction {
            emoji: "❤️".into(),
            user_id: UserId::from("u2"),
            reacted_at: ts(10),
        });
        msg.apply_reaction(Reaction {
            emoji: "❤️".into(),
            user_id: UserId::from("u3"),
            reacted_at: ts(11),
        });
        assert_eq!(msg.reactions.len(), 2);
    }

    #[test]
    fn same_user_different_emoji_coexist() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        msg.apply_reaction(Reaction {
            emoji: "👍".into(),
            user_id: UserId::from("u2"),
            reacted_at: ts(10),
        });
        msg.apply_reaction(Reaction {
            emoji: "🎉".into(),
            user_id: UserId::from("u2"),
            reacted_at: ts(11),
        });
        assert_eq!(msg.reactions.len(), 2);
    }

    #[test]
    fn remove_reaction_by_pair() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        msg.apply_reaction(Reaction {
            emoji: "👍".into(),
            user_id: UserId::from("u2"),
            reacted_at: ts(10),
        });

        assert!(msg.remove_reaction(&UserId::from("u2"), "👍"));
        assert!(msg.reactions.is_empty());
        // Removing again is a no-op
        assert!(!msg.remove_reaction(&UserId::from("u2"), "👍"));
    }

    // -- Message delete / edit --

    #[test]
    fn delete_clears_content_and_keeps_tombstone() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        let id = msg.id.clone();

        msg.delete(ts(200));

        assert!(msg.is_deleted());
        assert!(msg.content.is_empty());
        assert_eq!(msg.id, id, "tombstone keeps its identity");
        assert_eq!(msg.deleted_at, Some(ts(200)));
    }

    #[test]
    fn delete_is_idempotent() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        msg.delete(ts(200));
        msg.delete(ts(300));
        assert_eq!(msg.deleted_at, Some(ts(200)), "first deletion wins");
    }

    #[test]
    fn edit_updates_content_and_timestamp() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        assert!(msg.edit("changed", ts(150)));
        assert_eq!(msg.content, "changed");
        assert_eq!(msg.edited_at, Some(ts(150)));
    }

    #[test]
    fn edit_rejected_after_delete() {
        let conv = ConversationId::new();
        let mut msg = message_at(&conv, 100);
        msg.delete(ts(200));
        assert!(!msg.edit("necromancy", ts(300)));
        assert!(msg.content.is_empty());
        assert!(msg.edited_at.is_none());
    }

    // -- Conversation --

    #[test]
    fn new_conversation_defaults() {
        let conv = Conversation::new(
            vec![User::new("u1", "Alice"), User::new("u2", "Bob")],
            ConversationKind::Direct,
            None,
        );
        assert_eq!(conv.unread_count, 0);
        assert!(conv.last_message.is_none());
        assert!(!conv.pinned);
        assert!(!conv.muted);
        assert_eq!(conv.participants.len(), 2);
        assert_eq!(conv.created_at, conv.updated_at);
    }

    #[test]
    fn recompute_last_message_picks_latest() {
        let mut conv = Conversation::new(vec![], ConversationKind::Direct, None);
        let messages = vec![
            message_at(&conv.id, 100),
            message_at(&conv.id, 300),
            message_at(&conv.id, 200),
        ];
        conv.recompute_last_message(&messages);
        assert_eq!(conv.last_message.as_ref().unwrap().created_at, ts(300));
    }

    #[test]
    fn recompute_last_message_skips_tombstones() {
        let mut conv = Conversation::new(vec![], ConversationKind::Direct, None);
        let mut latest = message_at(&conv.id, 300);
        latest.delete(ts(400));
        let messages = vec![message_at(&conv.id, 100), latest];

        conv.recompute_last_message(&messages);
        assert_eq!(conv.last_message.as_ref().unwrap().created_at, ts(100));
    }

    #[test]
    fn recompute_last_message_all_deleted_is_none() {
        let mut conv = Conversation::new(vec![], ConversationKind::Direct, None);
        let mut only = message_at(&conv.id, 100);
        only.delete(ts(200));
        conv.recompute_last_message(&[only]);
        assert!(conv.last_message.is_none());
    }

    #[test]
    fn set_typing_inserts_and_removes() {
        let mut conv = Conversation::new(vec![], ConversationKind::Group, Some("g".into()));
        conv.set_typing(UserId::from("u2"), true);
        assert!(conv.anyone_typing(None));

        conv.set_typing(UserId::from("u2"), false);
        assert!(!conv.anyone_typing(None));
        assert!(conv.typing.is_empty(), "cleared flags are removed outright");
    }

    #[test]
    fn anyone_typing_excludes_given_user() {
        let mut conv = Conversation::new(vec![], ConversationKind::Group, None);
        conv.set_typing(UserId::from("me"), true);
        assert!(!conv.anyone_typing(Some(&UserId::from("me"))));
        assert!(conv.anyone_typing(None));
    }

    // -- serde wire format --

    #[test]
    fn message_serde_camel_case() {
        let conv = ConversationId::from("conv-1");
        let msg = message_at(&conv, 100);
        let val = serde_json::to_value(&msg).unwrap();

        assert!(val.get("conversationId").is_some());
        assert!(val.get("senderId").is_some());
        assert!(val.get("messageType").is_some());
        assert!(val.get("createdAt").is_some());
        // Empty/None optionals are omitted
        assert!(val.get("reactions").is_none());
        assert!(val.get("deletedAt").is_none());
    }

    #[test]
    fn conversation_serde_roundtrip() {
        let mut conv = Conversation::new(
            vec![User::new("u1", "Alice")],
            ConversationKind::Group,
            Some("Team".into()),
        );
        conv.pinned = true;
        conv.unread_count = 3;

        let json = serde_json::to_string(&conv).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(conv, back);
    }

    #[test]
    fn message_deserializes_with_missing_optionals() {
        let json = r#"{
            "id": "m1",
            "conversationId": "c1",
            "senderId": "u1",
            "content": "hello",
            "createdAt": "2025-01-15T10:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, MessageType::Text);
        assert_eq!(msg.status, MessageStatus::Sending);
        assert!(msg.reactions.is_empty());
    }
}
