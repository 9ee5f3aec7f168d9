use reqwest::Url;

use crate::ChatError;

/// Addresses derived from the origin of the page hosting the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    origin: Url,
    ws_url: String,
}

impl Endpoint {
    /// Maps `http://host` to `ws://host/ws` and `https://host` to `wss://host/ws`.
    pub fn from_origin(origin: &str) -> Result<Self, ChatError> {
        let origin = Url::parse(origin)
            .map_err(|e| ChatError::InvalidEndpoint(format!("{}: {}", origin, e)))?;

        let scheme = match origin.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(ChatError::InvalidEndpoint(format!(
                    "Unsupported page scheme: {}",
                    other
                )))
            }
        };

        let host = origin
            .host_str()
            .ok_or_else(|| ChatError::InvalidEndpoint(format!("Origin has no host: {}", origin)))?;

        let ws_url = match origin.port() {
            Some(port) => format!("{}://{}:{}/ws", scheme, host, port),
            None => format!("{}://{}/ws", scheme, host),
        };

        Ok(Self { origin, ws_url })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn is_secure(&self) -> bool {
        self.origin.scheme() == "https"
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute URL of a REST path on the same origin.
    pub fn api_url(&self, path: &str) -> Result<Url, ChatError> {
        self.origin
            .join(path)
            .map_err(|e| ChatError::InvalidEndpoint(format!("{}: {}", path, e)))
    }
}
