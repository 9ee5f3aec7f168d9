// Codec for the chat backend's JSON frames.
// Every frame is one JSON text message with a `type` discriminator, except
// history replays which arrive as a bare array of message objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChatMessage, UserIdentity};
use crate::ChatError;

/// Frames the client puts on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    Join {
        room: String,
        user: UserIdentity,
    },
    Message {
        room: String,
        content: String,
        sender: String,
        timestamp: DateTime<Utc>,
    },
    Typing {
        room: String,
        user: String,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

impl OutboundFrame {
    pub fn frame_type(&self) -> &'static str {
        match self {
            OutboundFrame::Join { .. } => "join",
            OutboundFrame::Message { .. } => "message",
            OutboundFrame::Typing { .. } => "typing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypingFrame {
    #[serde(default)]
    pub room: Option<String>,
    pub user: String,
    #[serde(rename = "isTyping", default)]
    pub is_typing: bool,
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    History(Vec<ChatMessage>),
    Typing(TypingFrame),
    Message(ChatMessage),
}

pub struct FrameCodec;

impl FrameCodec {
    pub fn encode(frame: &OutboundFrame) -> Result<String, ChatError> {
        Ok(serde_json::to_string(frame)?)
    }

    pub fn decode(text: &str) -> Result<InboundFrame, ChatError> {
        let value: Value = serde_json::from_str(text)?;

        // History replay
        if value.is_array() {
            return Ok(InboundFrame::History(serde_json::from_value(value)?));
        }

        let Some(object) = value.as_object() else {
            return Err(ChatError::InvalidResponse(format!(
                "Expected JSON object or array, got: {}",
                value
            )));
        };

        if object.get("type").and_then(Value::as_str) == Some("typing") {
            Ok(InboundFrame::Typing(serde_json::from_value(value)?))
        } else {
            Ok(InboundFrame::Message(serde_json::from_value(value)?))
        }
    }
}
