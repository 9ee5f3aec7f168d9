use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The local user as announced to the server in `join` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    pub id: String,
}

impl UserIdentity {
    pub fn new(username: &str, id: &str) -> Self {
        Self {
            username: username.to_string(),
            id: id.to_string(),
        }
    }

    /// Identity used when no stored user is available: "Anonymous" plus a
    /// freshly generated id.
    pub fn anonymous() -> Self {
        Self {
            username: "Anonymous".to_string(),
            id: Uuid::new_v4().to_string(),
        }
    }
}

/// Kind of a chat message, taken from the frame's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    #[default]
    Message,
    System,
    Join,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Message => "message",
            MessageKind::System => "system",
            MessageKind::Join => "join",
            MessageKind::Other(kind) => kind,
        }
    }
}

impl From<String> for MessageKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "message" => MessageKind::Message,
            "system" => MessageKind::System,
            "join" => MessageKind::Join,
            _ => MessageKind::Other(kind),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.as_str().to_string()
    }
}

// A chat message as it appears live on the socket and in history batches.
// History served by the REST API names the sender `username` and the time
// `created_at`, so both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, alias = "username")]
    pub sender: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(room: &str, sender: &str, content: &str) -> Self {
        Self {
            id: None,
            kind: MessageKind::Message,
            room: Some(room.to_string()),
            sender: sender.to_string(),
            content: content.to_string(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn system(room: &str, content: &str) -> Self {
        Self {
            kind: MessageKind::System,
            ..Self::new(room, "System", content)
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }

    pub fn belongs_to(&self, room: &str) -> bool {
        self.room.as_deref() == Some(room)
    }

    /// Same stored message: equal ids when both carry one, otherwise equal
    /// sender, content and timestamp.
    pub fn is_same_entry(&self, other: &ChatMessage) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.sender == other.sender
                    && self.content == other.content
                    && self.timestamp == other.timestamp
            }
        }
    }
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient user-visible notification ("toast").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

// Response envelope used by the REST API
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}
