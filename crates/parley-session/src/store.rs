//! Authoritative in-memory model of conversations and messages.
//!
//! The store owns the working set; every other component sees clones. All
//! mutations go through one mutex so each operation is atomic with respect
//! to a conversation's derived fields (`last_message`, `unread_count`) and
//! inbound frames apply fully, one at a time, in arrival order.
//!
//! Mutation methods return the [`SessionEvent`] the caller should publish
//! (or `None` when the frame produced no observable change). The store never
//! touches the event bus itself.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use parley_core::ids::{ConversationId, MessageId, UserId};
use parley_core::model::{
    Attachment, Conversation, ConversationKind, Message, MessageStatus, MessageType, Reaction,
    User,
};
use parley_core::{Result, SessionError};
use parley_protocol::frames::{InboundEvent, ReactionUpdate};

use crate::events::SessionEvent;

#[derive(Default)]
struct StoreInner {
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    /// Message → owning conversation, so message-keyed operations need no scan.
    index: HashMap<MessageId, ConversationId>,
}

/// The session's message store.
pub struct MessageStore {
    local_user_id: UserId,
    inner: Mutex<StoreInner>,
}

impl MessageStore {
    /// Create an empty store for the given local user.
    #[must_use]
    pub fn new(local_user_id: UserId) -> Self {
        Self {
            local_user_id,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// The local user this store derives unread counts against.
    #[must_use]
    pub fn local_user_id(&self) -> &UserId {
        &self.local_user_id
    }

    // ─── Inbound frame application ───────────────────────────────────────

    /// Apply one decoded inbound event.
    ///
    /// Returns the event to publish, or `None` if the frame changed nothing
    /// (duplicate message, stale status, `pong`).
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownConversation`] / [`SessionError::UnknownMessage`]
    /// when the frame references an entity not present locally. The caller's
    /// contract is to log and drop — membership must be established via a
    /// `conversation_update` before messages flow, never inferred.
    pub fn apply_inbound(&self, event: InboundEvent) -> Result<Option<SessionEvent>> {
        match event {
            InboundEvent::Message(message) => self.apply_message(message),
            InboundEvent::Typing(update) => {
                let mut inner = self.inner.lock();
                let conversation = inner
                    .conversations
                    .get_mut(&update.conversation_id)
                    .ok_or_else(|| {
                        SessionError::UnknownConversation(update.conversation_id.clone())
                    })?;
                conversation.set_typing(update.user_id.clone(), update.is_typing);
                Ok(Some(SessionEvent::TypingUpdated {
                    conversation_id: update.conversation_id,
                    user_id: update.user_id,
                    is_typing: update.is_typing,
                }))
            }
            InboundEvent::Reaction(update) => {
                let changed = self.apply_reaction(&update)?;
                if !changed && update.removed {
                    return Ok(None);
                }
                Ok(Some(SessionEvent::MessageReactionUpdated {
                    message_id: update.message_id,
                    conversation_id: update.conversation_id,
                    emoji: update.emoji,
                    user_id: update.user_id,
                    removed: update.removed,
                }))
            }
            InboundEvent::MessageStatus(update) => {
                let advanced = self.update_status(&update.message_id, update.status)?;
                if !advanced {
                    return Ok(None);
                }
                Ok(Some(SessionEvent::MessageStatusUpdated {
                    message_id: update.message_id,
                    conversation_id: update.conversation_id,
                    status: update.status,
                }))
            }
            InboundEvent::UserStatus(update) => {
                self.apply_presence(&update.user_id, update.online, update.last_seen_at.as_ref());
                Ok(Some(SessionEvent::UserStatusUpdated {
                    user_id: update.user_id,
                    online: update.online,
                    last_seen_at: update.last_seen_at,
                }))
            }
            InboundEvent::ConversationUpdate(snapshot) => Ok(Some(self.merge_conversation(snapshot))),
            InboundEvent::Pong => Ok(None),
        }
    }

    fn apply_message(&self, message: Message) -> Result<Option<SessionEvent>> {
        let mut inner = self.inner.lock();
        if !inner.conversations.contains_key(&message.conversation_id) {
            return Err(SessionError::UnknownConversation(message.conversation_id));
        }
        if inner.index.contains_key(&message.id) {
            debug!(message_id = %message.id, "duplicate inbound message, ignoring");
            return Ok(None);
        }

        let conversation_id = message.conversation_id.clone();
        let _ = inner.index.insert(message.id.clone(), conversation_id.clone());
        inner
            .messages
            .entry(conversation_id.clone())
            .or_default()
            .push(message.clone());

        let messages = &inner.messages[&conversation_id];
        let last_message = messages
            .iter()
            .filter(|m| !m.is_deleted())
            .max_by_key(|m| m.created_at)
            .cloned();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| SessionError::UnknownConversation(conversation_id.clone()))?;
        conversation.last_message = last_message;
        conversation.updated_at = conversation.updated_at.max(message.created_at);
        if message.sender_id != self.local_user_id {
            conversation.unread_count += 1;
        }
        // An inbound message supersedes the sender's typing flag.
        conversation.set_typing(message.sender_id.clone(), false);

        Ok(Some(SessionEvent::MessageReceived(message)))
    }

    // ─── Local mutations ─────────────────────────────────────────────────

    /// Append an optimistic local message in `sending` state.
    ///
    /// Returns the constructed message synchronously, before any network
    /// confirmation; a later `message_status` frame promotes it.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownConversation`] if the conversation is not known.
    pub fn append_local(
        &self,
        conversation_id: &ConversationId,
        content: impl Into<String>,
        message_type: MessageType,
        attachments: Vec<Attachment>,
    ) -> Result<Message> {
        let mut inner = self.inner.lock();
        if !inner.conversations.contains_key(conversation_id) {
            return Err(SessionError::UnknownConversation(conversation_id.clone()));
        }

        let mut message = Message::outgoing(
            conversation_id.clone(),
            self.local_user_id.clone(),
            content,
            message_type,
        );
        message.attachments = attachments;
        let _ = inner
            .index
            .insert(message.id.clone(), conversation_id.clone());
        inner
            .messages
            .entry(conversation_id.clone())
            .or_default()
            .push(message.clone());

        let conversation = inner
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| SessionError::UnknownConversation(conversation_id.clone()))?;
        conversation.last_message = Some(message.clone());
        conversation.updated_at = conversation.updated_at.max(message.created_at);

        Ok(message)
    }

    /// Advance a message's delivery status. Monotonic; a stale or backward
    /// status is ignored.
    ///
    /// Returns `true` if the status actually changed.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] if the message is not known.
    pub fn update_status(&self, message_id: &MessageId, status: MessageStatus) -> Result<bool> {
        let mut inner = self.inner.lock();
        let message = find_message(&mut inner, message_id)?;
        let advanced = message.status.advance(status);

        if advanced {
            // last_message carries a clone; keep its status in sync.
            let conversation_id = message.conversation_id.clone();
            if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
                if let Some(last) = conversation.last_message.as_mut() {
                    if last.id == *message_id {
                        let _ = last.status.advance(status);
                    }
                }
            }
        }
        Ok(advanced)
    }

    /// Apply a reaction add or removal.
    ///
    /// Adds are idempotent per `(user, emoji)` pair — re-adding replaces the
    /// timestamp. Returns `true` unless a removal found nothing to remove.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] if the message is not known.
    pub fn apply_reaction(&self, update: &ReactionUpdate) -> Result<bool> {
        let mut inner = self.inner.lock();
        let message = find_message(&mut inner, &update.message_id)?;
        if update.removed {
            Ok(message.remove_reaction(&update.user_id, &update.emoji))
        } else {
            message.apply_reaction(Reaction {
                emoji: update.emoji.clone(),
                user_id: update.user_id.clone(),
                reacted_at: update.timestamp,
            });
            Ok(true)
        }
    }

    /// Reset a conversation's unread count to zero. Idempotent.
    ///
    /// Does not retroactively change other users' message statuses — the
    /// read receipt itself is a transmitted side effect, not a store one.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownConversation`] if the conversation is not known.
    pub fn mark_read(&self, conversation_id: &ConversationId) -> Result<()> {
        let mut inner = self.inner.lock();
        let conversation = inner
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| SessionError::UnknownConversation(conversation_id.clone()))?;
        conversation.unread_count = 0;
        Ok(())
    }

    /// Replace a message's content, stamping `edited_at`.
    ///
    /// Returns `false` if the message is a tombstone (edits rejected).
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] if the message is not known.
    pub fn edit_message(&self, message_id: &MessageId, content: impl Into<String>) -> Result<bool> {
        let mut inner = self.inner.lock();
        let message = find_message(&mut inner, message_id)?;
        let edited = message.edit(content, Utc::now());
        if edited {
            refresh_last_message(&mut inner, message_id);
        }
        Ok(edited)
    }

    /// Delete a message, leaving a tombstone. Idempotent.
    ///
    /// The tombstone keeps its entry in the message list (reply-to chains
    /// stay resolvable) but is excluded from `last_message`.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] if the message is not known.
    pub fn delete_message(&self, message_id: &MessageId) -> Result<Message> {
        let mut inner = self.inner.lock();
        let message = find_message(&mut inner, message_id)?;
        message.delete(Utc::now());
        let deleted = message.clone();
        refresh_last_message(&mut inner, message_id);
        Ok(deleted)
    }

    /// Create a new conversation locally and return it.
    pub fn create_conversation(
        &self,
        participants: Vec<User>,
        kind: ConversationKind,
        name: Option<String>,
    ) -> Conversation {
        let conversation = Conversation::new(participants, kind, name);
        let mut inner = self.inner.lock();
        let _ = inner
            .messages
            .insert(conversation.id.clone(), Vec::new());
        let _ = inner
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        conversation
    }

    /// Merge an authoritative conversation snapshot.
    ///
    /// For a known conversation, wire-owned fields (membership, name, flags,
    /// settings) come from the snapshot while locally derived state
    /// (`unread_count`, typing flags, `last_message`) is preserved. An
    /// unknown conversation is inserted with its derived fields reset, since
    /// no messages are known for it yet.
    fn merge_conversation(&self, mut snapshot: Conversation) -> SessionEvent {
        let mut inner = self.inner.lock();
        match inner.conversations.get_mut(&snapshot.id) {
            Some(existing) => {
                existing.kind = snapshot.kind;
                existing.name = snapshot.name;
                existing.participants = snapshot.participants;
                existing.muted = snapshot.muted;
                existing.pinned = snapshot.pinned;
                existing.settings = snapshot.settings;
                existing.updated_at = existing.updated_at.max(snapshot.updated_at);
                SessionEvent::ConversationUpdated(existing.clone())
            }
            None => {
                snapshot.last_message = None;
                let _ = inner.messages.insert(snapshot.id.clone(), Vec::new());
                let _ = inner
                    .conversations
                    .insert(snapshot.id.clone(), snapshot.clone());
                SessionEvent::ConversationCreated(snapshot)
            }
        }
    }

    fn apply_presence(
        &self,
        user_id: &UserId,
        online: bool,
        last_seen_at: Option<&chrono::DateTime<Utc>>,
    ) {
        let mut inner = self.inner.lock();
        for conversation in inner.conversations.values_mut() {
            for participant in &mut conversation.participants {
                if participant.id == *user_id {
                    participant.online = online;
                    if let Some(seen) = last_seen_at {
                        participant.last_seen_at = Some(*seen);
                    }
                }
            }
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// All conversations, pinned first, then `updated_at` descending.
    ///
    /// The ordering is computed fresh on every call rather than maintained
    /// incrementally, so it cannot drift from the underlying state.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        let inner = self.inner.lock();
        let mut list: Vec<Conversation> = inner.conversations.values().cloned().collect();
        list.sort_by_key(|c| (!c.pinned, std::cmp::Reverse(c.updated_at)));
        list
    }

    /// One conversation by ID.
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.inner.lock().conversations.get(id).cloned()
    }

    /// Messages of one conversation in arrival order (tombstones included).
    /// Empty for an unknown conversation.
    #[must_use]
    pub fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.inner
            .lock()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// One message by ID.
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<Message> {
        let inner = self.inner.lock();
        let conversation_id = inner.index.get(id)?;
        inner
            .messages
            .get(conversation_id)?
            .iter()
            .find(|m| m.id == *id)
            .cloned()
    }
}

fn find_message<'a>(
    inner: &'a mut StoreInner,
    message_id: &MessageId,
) -> Result<&'a mut Message> {
    let conversation_id = inner
        .index
        .get(message_id)
        .cloned()
        .ok_or_else(|| SessionError::UnknownMessage(message_id.clone()))?;
    inner
        .messages
        .get_mut(&conversation_id)
        .and_then(|list| list.iter_mut().find(|m| m.id == *message_id))
        .ok_or_else(|| SessionError::UnknownMessage(message_id.clone()))
}

/// Recompute the owning conversation's `last_message` after a content-level
/// change to `message_id`.
fn refresh_last_message(inner: &mut StoreInner, message_id: &MessageId) {
    let Some(conversation_id) = inner.index.get(message_id).cloned() else {
        return;
    };
    let last = inner.messages.get(&conversation_id).and_then(|list| {
        list.iter()
            .filter(|m| !m.is_deleted())
            .max_by_key(|m| m.created_at)
            .cloned()
    });
    if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
        conversation.last_message = last;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
