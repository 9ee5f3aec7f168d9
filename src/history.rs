use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use tracing::{debug, error, warn};

use crate::endpoint::Endpoint;
use crate::models::{ApiResponse, ChatMessage};
use crate::settings::Settings;
use crate::ChatError;

const MESSAGES_PATH: &str = "/api/v1/messages";

/// Source of a room's past messages, oldest first.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    async fn fetch(&self, room: &str) -> Result<Vec<ChatMessage>, ChatError>;
}

/// Offline stand-in: a single system greeting for the room.
#[derive(Debug, Clone, Default)]
pub struct WelcomeHistory;

#[async_trait]
impl HistoryFetcher for WelcomeHistory {
    async fn fetch(&self, room: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let mut welcome = ChatMessage::system(room, &format!("Welcome to {}!", room));
        welcome.id = Some(1);
        welcome.timestamp = Some(Utc::now() - ChronoDuration::seconds(60));
        Ok(vec![welcome])
    }
}

/// Loads history from the backend's REST API on the page origin.
pub struct HttpHistoryFetcher {
    client: Client,
    endpoint: Endpoint,
    auth_token: Option<String>,
}

impl HttpHistoryFetcher {
    pub fn new(endpoint: Endpoint, auth_token: Option<String>, settings: &Settings) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.request_timeout)
            .build()?;
        Ok(Self::with_client(client, endpoint, auth_token))
    }

    pub fn with_client(client: Client, endpoint: Endpoint, auth_token: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            auth_token,
        }
    }

    pub fn request_url(&self, room: &str) -> Result<String, ChatError> {
        let base = self.endpoint.api_url(MESSAGES_PATH)?;
        let query = serde_urlencoded::to_string([("room", room)])?;
        Ok(format!("{}?{}", base, query))
    }
}

#[async_trait]
impl HistoryFetcher for HttpHistoryFetcher {
    async fn fetch(&self, room: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let url = self.request_url(room)?;
        debug!(%url, "Fetching message history");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let error_msg = format!("History request failed: {}: {}", status, body_text);
            error!("{}", error_msg);
            return Err(ChatError::InvalidResponse(error_msg));
        }

        let envelope = response.json::<ApiResponse<Vec<ChatMessage>>>().await?;
        if let Some(api_error) = envelope.error {
            warn!(code = %api_error.code, "History endpoint reported an error");
            return Err(ChatError::InvalidResponse(format!(
                "{}: {}",
                api_error.code, api_error.message
            )));
        }
        if !envelope.success {
            return Err(ChatError::InvalidResponse(
                envelope
                    .message
                    .unwrap_or_else(|| "History request unsuccessful".to_string()),
            ));
        }

        let mut messages = envelope.data.unwrap_or_default();
        // REST rows carry a room id rather than the name; tag them so they
        // route like live frames.
        for message in messages.iter_mut() {
            if message.room.is_none() {
                message.room = Some(room.to_string());
            }
        }
        debug!(count = messages.len(), "History loaded");
        Ok(messages)
    }
}
