//! Offline demo feed.
//!
//! [`SyntheticTransport`] satisfies the same inbound-frame contract as a live
//! socket: it seeds a couple of demo conversations, fabricates typing bursts
//! and messages on a randomized schedule, answers `ping` with `pong`, and
//! promotes sent messages through `sent → delivered → read`. Nothing
//! downstream can tell it apart from a server, which is the point — the
//! store and dispatch pipeline run unmodified.
//!
//! Selected by the `synthetic_feed` config flag; never a silent fallback.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use parley_core::Result;
use parley_core::ids::{ConversationId, MessageId, UserId};
use parley_core::model::{
    Conversation, ConversationKind, Message, MessageStatus, MessageType, User,
};
use parley_protocol::codec::encode_event;
use parley_protocol::frames::{InboundEvent, StatusUpdate, TypingUpdate};

use crate::config::SessionConfig;
use crate::transport::{Transport, TransportLink, channel_pair};

/// Seconds between fabricated chatter bursts (lower bound).
const CHATTER_MIN_SECS: u64 = 6;
/// Seconds between fabricated chatter bursts (upper bound).
const CHATTER_MAX_SECS: u64 = 14;

const PHRASES: &[&str] = &[
    "hey, you around?",
    "just pushed the fix",
    "lunch at noon?",
    "did you see the game last night",
    "ok that makes sense",
    "can you take a look when you get a chance",
    "🎉",
    "running a few minutes late",
];

/// Transport that generates its own traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticTransport;

#[async_trait]
impl Transport for SyntheticTransport {
    async fn connect(&self, config: &SessionConfig) -> Result<TransportLink> {
        let (link, peer) = channel_pair();
        let local_user = config.local_user_id.clone();
        let _ = tokio::spawn(async move {
            feed(peer.to_client, peer.from_client, peer.closed, local_user).await;
        });
        Ok(link)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

struct DemoWorld {
    /// (conversation, remote participants) pairs chatter draws from.
    conversations: Vec<(ConversationId, Vec<UserId>)>,
}

/// The feed task: seed, then chatter and answer commands until closed.
async fn feed(
    to_client: mpsc::Sender<String>,
    mut from_client: mpsc::Receiver<String>,
    closed: CancellationToken,
    local_user: UserId,
) {
    let world = seed(&to_client, &local_user).await;
    debug!(conversations = world.conversations.len(), "synthetic feed seeded");

    loop {
        let pause = Duration::from_secs(rand::rng().random_range(CHATTER_MIN_SECS..=CHATTER_MAX_SECS));
        tokio::select! {
            () = tokio::time::sleep(pause) => {
                chatter(&to_client, &closed, &world);
            }
            frame = from_client.recv() => {
                let Some(frame) = frame else { break };
                answer(&to_client, &closed, &frame);
            }
            () = closed.cancelled() => break,
        }
    }
    trace!("synthetic feed stopped");
}

/// Send the initial conversation snapshots and a greeting message.
async fn seed(to_client: &mpsc::Sender<String>, local_user: &UserId) -> DemoWorld {
    let me = User::new(local_user.clone(), "You");
    let mut ada = User::new("ada", "Ada");
    ada.online = true;
    let grace = User::new("grace", "Grace");
    let ken = User::new("ken", "Ken");

    let direct = Conversation::new(
        vec![me.clone(), ada.clone()],
        ConversationKind::Direct,
        None,
    );
    let mut group = Conversation::new(
        vec![me, ada, grace, ken],
        ConversationKind::Group,
        Some("The Lab".to_owned()),
    );
    group.pinned = true;

    let world = DemoWorld {
        conversations: vec![
            (direct.id.clone(), vec!["ada".into()]),
            (group.id.clone(), vec!["ada".into(), "grace".into(), "ken".into()]),
        ],
    };

    for conversation in [&direct, &group] {
        send_event(
            to_client,
            &InboundEvent::ConversationUpdate(conversation.clone()),
        )
        .await;
    }

    let mut greeting = Message::outgoing(
        direct.id,
        UserId::from("ada"),
        "welcome back!",
        MessageType::Text,
    );
    greeting.status = MessageStatus::Delivered;
    send_event(to_client, &InboundEvent::Message(greeting)).await;

    world
}

/// One fabricated burst: a typing indicator, a short pause, then a message.
/// Occasionally a presence flip instead.
fn chatter(to_client: &mpsc::Sender<String>, closed: &CancellationToken, world: &DemoWorld) {
    let (conversation_id, sender) = {
        let mut rng = rand::rng();
        let (conversation_id, users) = &world.conversations[rng.random_range(0..world.conversations.len())];
        (conversation_id.clone(), users[rng.random_range(0..users.len())].clone())
    };

    let to_client = to_client.clone();
    let closed = closed.clone();
    let _ = tokio::spawn(async move {
        if rand::rng().random_range(0..5) == 0 {
            let online = rand::rng().random_bool(0.5);
            send_event(
                &to_client,
                &InboundEvent::UserStatus(parley_protocol::frames::PresenceUpdate {
                    user_id: sender,
                    online,
                    last_seen_at: (!online).then(chrono::Utc::now),
                }),
            )
            .await;
            return;
        }

        send_event(
            &to_client,
            &InboundEvent::Typing(TypingUpdate {
                conversation_id: conversation_id.clone(),
                user_id: sender.clone(),
                is_typing: true,
                timestamp: chrono::Utc::now(),
            }),
        )
        .await;

        let compose = Duration::from_millis(rand::rng().random_range(800..2200));
        tokio::select! {
            () = tokio::time::sleep(compose) => {}
            () = closed.cancelled() => return,
        }

        let phrase = PHRASES[rand::rng().random_range(0..PHRASES.len())];
        let mut message =
            Message::outgoing(conversation_id, sender, phrase, MessageType::Text);
        message.status = MessageStatus::Sent;
        send_event(&to_client, &InboundEvent::Message(message)).await;
    });
}

/// React to a client command frame.
fn answer(to_client: &mpsc::Sender<String>, closed: &CancellationToken, frame: &str) {
    let Ok(value) = serde_json::from_str::<Value>(frame) else {
        return;
    };
    match value["type"].as_str() {
        Some("ping") => {
            let to_client = to_client.clone();
            let _ = tokio::spawn(async move {
                send_event(&to_client, &InboundEvent::Pong).await;
            });
        }
        Some("send_message") => {
            let (Some(message_id), Some(conversation_id)) = (
                value["payload"]["messageId"].as_str(),
                value["payload"]["conversationId"].as_str(),
            ) else {
                return;
            };
            promote(
                to_client.clone(),
                closed.clone(),
                MessageId::from(message_id),
                ConversationId::from(conversation_id),
            );
        }
        // Typing, reactions, receipts need no reply.
        _ => {}
    }
}

/// Walk a freshly sent message through the delivery pipeline.
fn promote(
    to_client: mpsc::Sender<String>,
    closed: CancellationToken,
    message_id: MessageId,
    conversation_id: ConversationId,
) {
    const STAGES: [(u64, MessageStatus); 3] = [
        (150, MessageStatus::Sent),
        (600, MessageStatus::Delivered),
        (1800, MessageStatus::Read),
    ];

    let _ = tokio::spawn(async move {
        for (delay_ms, status) in STAGES {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                () = closed.cancelled() => return,
            }
            send_event(
                &to_client,
                &InboundEvent::MessageStatus(StatusUpdate {
                    message_id: message_id.clone(),
                    conversation_id: conversation_id.clone(),
                    status,
                }),
            )
            .await;
        }
    });
}

async fn send_event(to_client: &mpsc::Sender<String>, event: &InboundEvent) {
    if let Ok(wire) = encode_event(event) {
        let _ = to_client.send(wire).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::codec::{decode_frame, encode_command};
    use parley_protocol::frames::{OutboundCommand, SendMessagePayload};

    async fn next_event(link: &mut TransportLink) -> InboundEvent {
        let raw = link.inbound.recv().await.expect("feed ended early");
        decode_frame(&raw).expect("synthetic feed emits valid frames")
    }

    #[tokio::test(start_paused = true)]
    async fn seeds_two_conversations_and_a_greeting() {
        let mut link = SyntheticTransport
            .connect(&SessionConfig::default())
            .await
            .unwrap();

        let mut snapshots = 0;
        let mut greeting = None;
        for _ in 0..3 {
            match next_event(&mut link).await {
                InboundEvent::ConversationUpdate(_) => snapshots += 1,
                InboundEvent::Message(m) => greeting = Some(m),
                other => panic!("unexpected seed event {other:?}"),
            }
        }
        assert_eq!(snapshots, 2);
        let greeting = greeting.expect("greeting message seeded");
        assert_eq!(greeting.sender_id.as_str(), "ada");
    }

    #[tokio::test(start_paused = true)]
    async fn ping_is_answered_with_pong() {
        let mut link = SyntheticTransport
            .connect(&SessionConfig::default())
            .await
            .unwrap();
        link.outbound
            .send(encode_command(&OutboundCommand::Ping).unwrap())
            .await
            .unwrap();

        // Chatter may interleave; scan for the pong.
        for _ in 0..20 {
            if matches!(next_event(&mut link).await, InboundEvent::Pong) {
                return;
            }
        }
        panic!("no pong within 20 frames");
    }

    #[tokio::test(start_paused = true)]
    async fn sent_message_is_promoted_through_the_pipeline() {
        let mut link = SyntheticTransport
            .connect(&SessionConfig::default())
            .await
            .unwrap();

        let message = Message::outgoing(
            ConversationId::from("c-demo"),
            UserId::from("local"),
            "outbound",
            MessageType::Text,
        );
        let command = OutboundCommand::SendMessage(SendMessagePayload::from_message(&message));
        link.outbound
            .send(encode_command(&command).unwrap())
            .await
            .unwrap();

        let mut statuses = Vec::new();
        for _ in 0..40 {
            if let InboundEvent::MessageStatus(update) = next_event(&mut link).await {
                if update.message_id == message.id {
                    statuses.push(update.status);
                    if statuses.len() == 3 {
                        break;
                    }
                }
            }
        }
        assert_eq!(
            statuses,
            [
                MessageStatus::Sent,
                MessageStatus::Delivered,
                MessageStatus::Read
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_link_stops_the_feed() {
        let mut link = SyntheticTransport
            .connect(&SessionConfig::default())
            .await
            .unwrap();
        link.closed.cancel();

        // Drain whatever was in flight; the channel must then close.
        while link.inbound.recv().await.is_some() {}
    }
}
