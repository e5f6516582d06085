//! The messaging session facade.
//!
//! [`MessagingSession`] is the one surface UI code depends on. It wires the
//! store, event bus, connection manager and typing coordinator together and
//! runs the dispatch loop: decoded inbound events are applied to the store
//! one at a time, in arrival order, and the resulting bus events published —
//! so a frame is fully applied before the next one is looked at.
//!
//! Public mutations follow the optimistic pattern throughout: apply locally,
//! publish the bus event, then transmit. A transport failure never rolls the
//! local mutation back — a message stuck in `sending` is a caller-visible
//! condition, not something the core retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use parley_core::ids::{ConversationId, MessageId};
use parley_core::model::{Attachment, Conversation, ConversationKind, Message, MessageType, User};
use parley_core::{Result, SessionError};
use parley_protocol::frames::{
    EditPayload, InboundEvent, MarkReadPayload, MessageRefPayload, OutboundCommand,
    ReactionUpdate, SendMessagePayload,
};

use crate::bus::{EventBus, SubscriptionId};
use crate::config::SessionConfig;
use crate::connection::{ConnectionHandle, ConnectionManager, ConnectionState};
use crate::events::SessionEvent;
use crate::store::MessageStore;
use crate::synthetic::SyntheticTransport;
use crate::transport::{Transport, WsTransport};
use crate::typing::TypingCoordinator;

/// A live messaging session.
pub struct MessagingSession {
    config: SessionConfig,
    store: Arc<MessageStore>,
    bus: Arc<EventBus>,
    connection: ConnectionHandle,
    typing: Arc<TypingCoordinator>,
    closed: AtomicBool,
}

impl MessagingSession {
    /// Start a session with the transport the config selects: the live
    /// WebSocket, or the synthetic feed when `synthetic_feed` is set.
    ///
    /// Must be called within a tokio runtime; connection and dispatch tasks
    /// are spawned immediately.
    #[must_use]
    pub fn start(config: SessionConfig) -> Self {
        let transport: Arc<dyn Transport> = if config.synthetic_feed {
            Arc::new(SyntheticTransport)
        } else {
            Arc::new(WsTransport)
        };
        Self::with_transport(config, transport)
    }

    /// Start a session over an explicit transport.
    #[must_use]
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        info!(
            transport = transport.name(),
            local_user = %config.local_user_id,
            "starting messaging session"
        );
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(MessageStore::new(config.local_user_id.clone()));

        let mut connection =
            ConnectionManager::new(config.clone(), transport, Arc::clone(&bus)).spawn();
        let inbound = connection
            .take_inbound()
            .unwrap_or_else(|| mpsc::channel(1).1);
        let typing = Arc::new(TypingCoordinator::new(
            connection.command_sender(),
            config.local_user_id.clone(),
            Duration::from_millis(config.typing_timeout_ms),
        ));

        let _ = tokio::spawn(dispatch(inbound, Arc::clone(&store), Arc::clone(&bus)));

        Self {
            config,
            store,
            bus,
            connection,
            typing,
            closed: AtomicBool::new(false),
        }
    }

    /// The configuration this session was started with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current connection lifecycle state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    // ─── Messaging ───────────────────────────────────────────────────────

    /// Send a message: optimistic local append, then transmit.
    ///
    /// Returns the message immediately in `sending` state. If the transport
    /// is down the message stays `sending` — there is no automatic retry;
    /// resending is an explicit caller action.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownConversation`] for an unknown target,
    /// [`SessionError::Closed`] after `disconnect`.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        content: impl Into<String>,
        message_type: MessageType,
        attachments: Vec<Attachment>,
    ) -> Result<Message> {
        self.ensure_open()?;
        let message =
            self.store
                .append_local(conversation_id, content, message_type, attachments)?;
        counter!("session_messages_sent_total").increment(1);
        self.bus.emit(&SessionEvent::MessageSent(message.clone()));

        let command = OutboundCommand::SendMessage(SendMessagePayload::from_message(&message));
        self.transmit(command).await;
        Ok(message)
    }

    /// Send a typing indicator. `true` arms the auto-stop timer.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after `disconnect`.
    pub async fn send_typing(
        &self,
        conversation_id: &ConversationId,
        is_typing: bool,
    ) -> Result<()> {
        self.ensure_open()?;
        self.typing.send_typing(conversation_id, is_typing).await
    }

    /// Add a reaction from the local user.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] / [`SessionError::Closed`].
    pub async fn add_reaction(&self, message_id: &MessageId, emoji: &str) -> Result<()> {
        self.react(message_id, emoji, false).await
    }

    /// Remove the local user's reaction.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] / [`SessionError::Closed`].
    pub async fn remove_reaction(&self, message_id: &MessageId, emoji: &str) -> Result<()> {
        self.react(message_id, emoji, true).await
    }

    async fn react(&self, message_id: &MessageId, emoji: &str, removed: bool) -> Result<()> {
        self.ensure_open()?;
        let message = self
            .store
            .message(message_id)
            .ok_or_else(|| SessionError::UnknownMessage(message_id.clone()))?;

        let update = ReactionUpdate {
            message_id: message_id.clone(),
            conversation_id: message.conversation_id.clone(),
            emoji: emoji.to_owned(),
            user_id: self.config.local_user_id.clone(),
            timestamp: Utc::now(),
            removed,
        };
        let changed = self.store.apply_reaction(&update)?;
        if changed {
            self.bus.emit(&SessionEvent::MessageReactionUpdated {
                message_id: message_id.clone(),
                conversation_id: message.conversation_id.clone(),
                emoji: emoji.to_owned(),
                user_id: self.config.local_user_id.clone(),
                removed,
            });
        }

        let payload = MessageRefPayload {
            message_id: message_id.clone(),
            conversation_id: message.conversation_id,
            user_id: self.config.local_user_id.clone(),
            emoji: Some(emoji.to_owned()),
        };
        let command = if removed {
            OutboundCommand::RemoveReaction(payload)
        } else {
            OutboundCommand::AddReaction(payload)
        };
        self.transmit(command).await;
        Ok(())
    }

    /// Mark a conversation read up to `message_id`: zeroes the local unread
    /// count and transmits the receipt for peer-side reconciliation.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownConversation`] / [`SessionError::Closed`].
    pub async fn mark_as_read(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<()> {
        self.ensure_open()?;
        self.store.mark_read(conversation_id)?;
        if let Some(conversation) = self.store.conversation(conversation_id) {
            self.bus
                .emit(&SessionEvent::ConversationUpdated(conversation));
        }

        self.transmit(OutboundCommand::MarkRead(MarkReadPayload {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
        }))
        .await;
        Ok(())
    }

    /// Delete a message, leaving a tombstone locally, and transmit.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] / [`SessionError::Closed`].
    pub async fn delete_message(&self, message_id: &MessageId) -> Result<()> {
        self.ensure_open()?;
        let deleted = self.store.delete_message(message_id)?;
        if let Some(conversation) = self.store.conversation(&deleted.conversation_id) {
            self.bus
                .emit(&SessionEvent::ConversationUpdated(conversation));
        }

        self.transmit(OutboundCommand::DeleteMessage(MessageRefPayload {
            message_id: message_id.clone(),
            conversation_id: deleted.conversation_id,
            user_id: self.config.local_user_id.clone(),
            emoji: None,
        }))
        .await;
        Ok(())
    }

    /// Edit a message's content and transmit. Tombstones reject edits; the
    /// edit is then neither applied nor transmitted.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`] / [`SessionError::Closed`].
    pub async fn edit_message(
        &self,
        message_id: &MessageId,
        new_content: impl Into<String>,
    ) -> Result<()> {
        self.ensure_open()?;
        let content = new_content.into();
        if !self.store.edit_message(message_id, content.clone())? {
            debug!(message_id = %message_id, "edit rejected on deleted message");
            return Ok(());
        }
        let message = self
            .store
            .message(message_id)
            .ok_or_else(|| SessionError::UnknownMessage(message_id.clone()))?;
        if let Some(conversation) = self.store.conversation(&message.conversation_id) {
            self.bus
                .emit(&SessionEvent::ConversationUpdated(conversation));
        }

        self.transmit(OutboundCommand::EditMessage(EditPayload {
            message_id: message_id.clone(),
            conversation_id: message.conversation_id,
            content,
        }))
        .await;
        Ok(())
    }

    /// Create a conversation locally and publish `conversation_created`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after `disconnect`.
    pub fn create_conversation(
        &self,
        participants: Vec<User>,
        kind: ConversationKind,
        name: Option<String>,
    ) -> Result<Conversation> {
        self.ensure_open()?;
        let conversation = self.store.create_conversation(participants, kind, name);
        self.bus
            .emit(&SessionEvent::ConversationCreated(conversation.clone()));
        Ok(conversation)
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Conversation snapshots, pinned first, then `updated_at` descending.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.store.conversations()
    }

    /// Message snapshots for one conversation, in arrival order.
    #[must_use]
    pub fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.store.messages(conversation_id)
    }

    // ─── Subscriptions ───────────────────────────────────────────────────

    /// Subscribe to a named event. See [`crate::events::ALL_EVENT_TYPES`].
    pub fn on(
        &self,
        event_type: &str,
        callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.bus.on(event_type, callback)
    }

    /// Remove a subscription.
    pub fn off(&self, id: SubscriptionId) {
        self.bus.off(id);
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Tear the session down: cancels the heartbeat, every typing timer, and
    /// any scheduled reconnect. Mutating calls fail with
    /// [`SessionError::Closed`] afterwards; snapshots stay readable.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("disconnecting session");
        self.typing.shutdown();
        self.connection.disconnect();
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Transmit best-effort: a send failure is recovered internally (the
    /// reconnect machinery owns the connection), never surfaced here.
    async fn transmit(&self, command: OutboundCommand) {
        if let Err(e) = self.connection.send(command).await {
            warn!(error = %e, "command not transmitted");
        }
    }
}

impl Drop for MessagingSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// The dispatch loop: one inbound event at a time, fully applied before the
/// next, store errors logged and dropped.
async fn dispatch(
    mut inbound: mpsc::Receiver<InboundEvent>,
    store: Arc<MessageStore>,
    bus: Arc<EventBus>,
) {
    while let Some(event) = inbound.recv().await {
        counter!("session_frames_applied_total").increment(1);
        match store.apply_inbound(event) {
            Ok(Some(bus_event)) => bus.emit(&bus_event),
            Ok(None) => {}
            Err(e) => {
                // Unknown-entity frames are dropped, per the error contract.
                warn!(error = %e, "inbound event not applied");
                counter!("session_frames_dropped_total").increment(1);
            }
        }
    }
    debug!("dispatch loop ended");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
