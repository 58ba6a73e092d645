use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Outbound event types on the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Sent once after the session is registered with the hub
    #[serde(rename = "system.ready")]
    Ready,

    /// Per-command acknowledgement; only sent when a command failed
    #[serde(rename = "system.ack")]
    Ack,

    /// A message was persisted in the session's room
    #[serde(rename = "message.create")]
    MessageCreate,
}

/// Envelope written to the client: `{type, data?, error?, ts}`.
///
/// `ts` is the server's emission time, not the message creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub ts: DateTime<Utc>,
}

impl ServerEvent {
    pub fn ready() -> Self {
        Self {
            kind: EventKind::Ready,
            data: None,
            error: None,
            ts: Utc::now(),
        }
    }

    pub fn ack_error(error: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Ack,
            data: None,
            error: Some(error.into()),
            ts: Utc::now(),
        }
    }

    pub fn message_create(message: Message) -> Self {
        Self {
            kind: EventKind::MessageCreate,
            data: Some(message),
            error: None,
            ts: Utc::now(),
        }
    }
}

pub const CMD_MESSAGE_CREATE: &str = "message.create";

/// Raw inbound envelope `{type, data}`.
///
/// `data` stays undecoded until the type is known, so unknown command types
/// pass through without a schema.
#[derive(Debug, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreateData {
    pub content: String,
}

/// Commands sent FROM client TO server.
#[derive(Debug)]
pub enum ClientCommand {
    MessageCreate(MessageCreateData),
}

/// Why an inbound frame produced no command.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameRejection {
    /// Not a `{type, data}` envelope at all
    MalformedEnvelope,
    /// Known type whose `data` did not match its schema
    MalformedData(&'static str),
    /// Well-formed envelope with a type this server does not handle
    UnknownType(String),
}

impl ClientCommand {
    pub fn decode(frame: &[u8]) -> Result<Self, FrameRejection> {
        let envelope: CommandEnvelope =
            serde_json::from_slice(frame).map_err(|_| FrameRejection::MalformedEnvelope)?;

        match envelope.kind.as_str() {
            CMD_MESSAGE_CREATE => serde_json::from_value(envelope.data)
                .map(ClientCommand::MessageCreate)
                .map_err(|_| FrameRejection::MalformedData(CMD_MESSAGE_CREATE)),
            _ => Err(FrameRejection::UnknownType(envelope.kind)),
        }
    }
}
