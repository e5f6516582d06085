//! Stateless frame codec: wire JSON ↔ typed events.
//!
//! Decoding is two-stage: the envelope (`{type, payload}`) is parsed first,
//! then the payload is deserialized against the schema for that type. This
//! keeps the failure modes distinguishable — an unrecognized `type` string
//! is [`DecodeError::UnknownType`], a recognized type with a bad payload is
//! [`DecodeError::Payload`], and non-JSON input is [`DecodeError::Malformed`].
//!
//! The caller's contract on any decode failure is: log, drop the frame, keep
//! the connection open.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use parley_core::errors::SessionError;

use crate::frames::{InboundEvent, OutboundCommand};

/// Errors produced while decoding or encoding a frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input was not a JSON envelope at all.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope's `type` is not in the inbound vocabulary.
    #[error("unrecognized frame type: {frame_type}")]
    UnknownType {
        /// The offending `type` string.
        frame_type: String,
    },

    /// The payload did not match the schema for its frame type.
    #[error("invalid {frame_type} payload: {source}")]
    Payload {
        /// The frame type whose schema was violated.
        frame_type: &'static str,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A frame type that requires a payload arrived without one.
    #[error("missing payload for frame type: {frame_type}")]
    MissingPayload {
        /// The frame type missing its payload.
        frame_type: &'static str,
    },
}

impl From<DecodeError> for SessionError {
    fn from(err: DecodeError) -> Self {
        SessionError::decode(err.to_string())
    }
}

/// The outer envelope shared by every frame.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    payload: Option<Value>,
}

fn payload_for(frame_type: &'static str, payload: Option<Value>) -> Result<Value, DecodeError> {
    payload.ok_or(DecodeError::MissingPayload { frame_type })
}

fn parse<T: serde::de::DeserializeOwned>(
    frame_type: &'static str,
    payload: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|source| DecodeError::Payload { frame_type, source })
}

/// Decode one inbound wire frame into its typed event.
///
/// # Errors
///
/// Returns a [`DecodeError`] for non-JSON input, an unrecognized `type`, or
/// a payload that fails schema validation. Never panics.
pub fn decode_frame(raw: &str) -> Result<InboundEvent, DecodeError> {
    let frame: RawFrame = serde_json::from_str(raw).map_err(DecodeError::Malformed)?;

    match frame.frame_type.as_str() {
        "message" => Ok(InboundEvent::Message(parse(
            "message",
            payload_for("message", frame.payload)?,
        )?)),
        "typing" => Ok(InboundEvent::Typing(parse(
            "typing",
            payload_for("typing", frame.payload)?,
        )?)),
        "reaction" => Ok(InboundEvent::Reaction(parse(
            "reaction",
            payload_for("reaction", frame.payload)?,
        )?)),
        "message_status" => Ok(InboundEvent::MessageStatus(parse(
            "message_status",
            payload_for("message_status", frame.payload)?,
        )?)),
        "user_status" => Ok(InboundEvent::UserStatus(parse(
            "user_status",
            payload_for("user_status", frame.payload)?,
        )?)),
        "conversation_update" => Ok(InboundEvent::ConversationUpdate(parse(
            "conversation_update",
            payload_for("conversation_update", frame.payload)?,
        )?)),
        "pong" => Ok(InboundEvent::Pong),
        other => Err(DecodeError::UnknownType {
            frame_type: other.to_owned(),
        }),
    }
}

/// Encode an outbound command into its wire frame string.
///
/// # Errors
///
/// Returns [`DecodeError::Payload`] if the payload fails to serialize
/// (practically unreachable for these types, but never panics).
pub fn encode_command(command: &OutboundCommand) -> Result<String, DecodeError> {
    let frame_type = command.command_type();
    let payload = match command {
        OutboundCommand::SendMessage(p) => Some(to_value(frame_type, p)?),
        OutboundCommand::Typing(p) => Some(to_value(frame_type, p)?),
        OutboundCommand::AddReaction(p) | OutboundCommand::RemoveReaction(p) => {
            Some(to_value(frame_type, p)?)
        }
        OutboundCommand::MarkRead(p) => Some(to_value(frame_type, p)?),
        OutboundCommand::DeleteMessage(p) => Some(to_value(frame_type, p)?),
        OutboundCommand::EditMessage(p) => Some(to_value(frame_type, p)?),
        OutboundCommand::Ping => None,
    };
    Ok(envelope(frame_type, payload))
}

/// Encode an inbound event into its wire frame string.
///
/// Used by synthetic feeds and tests to fabricate server traffic through the
/// exact same representation a live socket delivers.
///
/// # Errors
///
/// Returns [`DecodeError::Payload`] if the payload fails to serialize.
pub fn encode_event(event: &InboundEvent) -> Result<String, DecodeError> {
    let frame_type = event.event_type();
    let payload = match event {
        InboundEvent::Message(m) => Some(to_value(frame_type, m)?),
        InboundEvent::Typing(p) => Some(to_value(frame_type, p)?),
        InboundEvent::Reaction(p) => Some(to_value(frame_type, p)?),
        InboundEvent::MessageStatus(p) => Some(to_value(frame_type, p)?),
        InboundEvent::UserStatus(p) => Some(to_value(frame_type, p)?),
        InboundEvent::ConversationUpdate(c) => Some(to_value(frame_type, c)?),
        InboundEvent::Pong => None,
    };
    Ok(envelope(frame_type, payload))
}

fn to_value<T: serde::Serialize>(
    frame_type: &'static str,
    payload: &T,
) -> Result<Value, DecodeError> {
    serde_json::to_value(payload).map_err(|source| DecodeError::Payload { frame_type, source })
}

fn envelope(frame_type: &str, payload: Option<Value>) -> String {
    let frame = match payload {
        Some(payload) => serde_json::json!({ "type": frame_type, "payload": payload }),
        None => serde_json::json!({ "type": frame_type }),
    };
    frame.to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
