use once_cell::sync::Lazy;
use std::{env, str::FromStr, time::Duration};

/// Holds all tunables, read-once from ENV with fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub typing_idle_timeout: Duration,
    pub event_buffer_capacity: usize,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_millis(1000),
            reconnect_max_delay: Duration::from_millis(30_000),
            max_reconnect_attempts: 5,
            typing_idle_timeout: Duration::from_millis(3000),
            event_buffer_capacity: 100,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Reads overrides from the environment (and `.env`, if present).
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = Settings::default();
        Settings {
            reconnect_base_delay: env_millis("RECONNECT_BASE_DELAY_MS")
                .unwrap_or(defaults.reconnect_base_delay),
            reconnect_max_delay: env_millis("RECONNECT_MAX_DELAY_MS")
                .unwrap_or(defaults.reconnect_max_delay),
            max_reconnect_attempts: env_parse("MAX_RECONNECT_ATTEMPTS")
                .unwrap_or(defaults.max_reconnect_attempts),
            typing_idle_timeout: env_millis("TYPING_IDLE_TIMEOUT_MS")
                .unwrap_or(defaults.typing_idle_timeout),
            event_buffer_capacity: env_parse("EVENT_BUFFER_CAPACITY")
                .unwrap_or(defaults.event_buffer_capacity),
            request_timeout: env_parse("REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

fn env_parse<T: FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(var: &str) -> Option<Duration> {
    env_parse(var).map(Duration::from_millis)
}

/// Global settings instance
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);
