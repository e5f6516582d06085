//! # parley-protocol
//!
//! Bidirectional mapping between wire frames and typed session events.
//!
//! Every frame on the wire is a JSON envelope `{ "type": <str>, "payload":
//! <object> }`. Inbound frame types form the closed set in [`InboundEvent`];
//! outbound command types form the closed set in [`OutboundCommand`].
//!
//! The codec in [`codec`] is stateless and side-effect free: decoding a
//! malformed or unrecognized frame yields a [`DecodeError`](codec::DecodeError)
//! for the caller to log and drop — it never panics and never closes the
//! connection.

#![deny(unsafe_code)]

pub mod codec;
pub mod frames;

pub use codec::{DecodeError, decode_frame, encode_command, encode_event};
pub use frames::{
    EditPayload, InboundEvent, MarkReadPayload, MessageRefPayload, OutboundCommand,
    PresenceUpdate, ReactionUpdate, SendMessagePayload, StatusUpdate, TypingCommand, TypingUpdate,
};
