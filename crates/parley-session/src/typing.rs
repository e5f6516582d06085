//! Outbound typing indicator suppression.
//!
//! One auto-stop timer per conversation: `send_typing(conv, true)` transmits
//! the indicator and arms a timer that transmits `is_typing: false` exactly
//! once if the caller never clears it — a client that forgets to stop typing
//! cannot leave a stuck indicator on the other side.
//!
//! This is purely outbound machinery. Inbound typing frames land directly on
//! the conversation's per-user flags in the store; the remote sender's own
//! coordinator is responsible for eventually clearing those.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use parley_core::ids::{ConversationId, UserId};
use parley_core::{Result, SessionError};
use parley_protocol::frames::{OutboundCommand, TypingCommand};

/// Per-conversation outbound typing timers.
pub struct TypingCoordinator {
    commands: mpsc::Sender<OutboundCommand>,
    local_user_id: UserId,
    timeout: Duration,
    /// Armed auto-stop timers, keyed by conversation. The generation counter
    /// lets an expired timer tell whether it was superseded before it could
    /// clean up its map entry.
    timers: Mutex<HashMap<ConversationId, (u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl TypingCoordinator {
    /// Create a coordinator transmitting through `commands`.
    #[must_use]
    pub fn new(
        commands: mpsc::Sender<OutboundCommand>,
        local_user_id: UserId,
        timeout: Duration,
    ) -> Self {
        Self {
            commands,
            local_user_id,
            timeout,
            timers: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Transmit a typing indicator for the local user.
    ///
    /// `true` (re)arms the auto-stop timer for the conversation; `false`
    /// cancels it. Either way the command is transmitted immediately.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] if the session's command channel is gone.
    pub async fn send_typing(
        self: &std::sync::Arc<Self>,
        conversation_id: &ConversationId,
        is_typing: bool,
    ) -> Result<()> {
        // Any previous timer for this conversation is superseded.
        if let Some((_, token)) = self.timers.lock().remove(conversation_id) {
            token.cancel();
        }

        self.transmit(conversation_id.clone(), is_typing).await?;

        if is_typing {
            self.arm_auto_stop(conversation_id.clone());
        }
        Ok(())
    }

    fn arm_auto_stop(self: &std::sync::Arc<Self>, conversation_id: ConversationId) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let _ = self
            .timers
            .lock()
            .insert(conversation_id.clone(), (generation, token.clone()));

        let this = std::sync::Arc::clone(self);
        let _ = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(this.timeout) => {
                    // Remove our own entry unless a newer timer replaced it.
                    {
                        let mut timers = this.timers.lock();
                        match timers.get(&conversation_id) {
                            Some((current, _)) if *current == generation => {
                                let _ = timers.remove(&conversation_id);
                            }
                            _ => return,
                        }
                    }
                    debug!(conversation_id = %conversation_id, "typing auto-stop fired");
                    let _ = this.transmit(conversation_id, false).await;
                }
                () = token.cancelled() => {
                    trace!(conversation_id = %conversation_id, "typing auto-stop cancelled");
                }
            }
        });
    }

    async fn transmit(&self, conversation_id: ConversationId, is_typing: bool) -> Result<()> {
        let command = OutboundCommand::Typing(TypingCommand {
            conversation_id,
            user_id: self.local_user_id.clone(),
            is_typing,
        });
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Cancel every armed timer. No auto-stop frames fire after this.
    pub fn shutdown(&self) {
        let mut timers = self.timers.lock();
        for (_, token) in timers.values() {
            token.cancel();
        }
        timers.clear();
    }

    /// Number of conversations with an armed auto-stop timer.
    #[must_use]
    pub fn armed_timers(&self) -> usize {
        self.timers.lock().len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
