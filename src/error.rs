use thiserror::Error;
use tokio_tungstenite::tungstenite;

// Basic error handling with thiserror
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("WebSocket transport failed: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("URL encoding failed: {0}")]
    UrlEncodingFailed(#[from] serde_urlencoded::ser::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Message content is empty")]
    EmptyMessage,

    #[error("Room name is empty")]
    EmptyRoomName,

    #[error("No room joined")]
    NotInRoom,

    #[error("Transport is not open")]
    NotConnected,

    #[error("Sending frame failed: {0}")]
    SendFailed(String),

    #[error("Chat client task is no longer running")]
    ClientStopped,

    #[error("Task panicked or cancelled")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

impl ChatError {
    /// True for failures the client recovers from on its own: transport
    /// drops drive the reconnect loop, bad frames are skipped.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChatError::Transport(_)
                | ChatError::RequestFailed(_)
                | ChatError::ParseFailed(_)
                | ChatError::InvalidResponse(_)
                | ChatError::SendFailed(_)
        )
    }

    /// True for input that was rejected locally before anything hit the wire.
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage
                | ChatError::EmptyRoomName
                | ChatError::NotInRoom
                | ChatError::NotConnected
        )
    }
}
