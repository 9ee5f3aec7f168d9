use std::time::Duration;

use crate::models::UserIdentity;
use crate::settings::Settings;

/// Lifecycle of the single transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    /// Reconnection attempts exhausted; only an explicit connect leaves this state.
    Failed,
}

impl ConnectionState {
    /// Text for the status indicator
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Idle => "Offline",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Open => "Connected",
            ConnectionState::Closed => "Disconnected",
            ConnectionState::Failed => "Connection failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Failed
    }
}

/// Which room the client is viewing, and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSession {
    room: Option<String>,
    user: UserIdentity,
}

impl RoomSession {
    pub fn new(user: UserIdentity) -> Self {
        Self { room: None, user }
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn is_in(&self, room: &str) -> bool {
        self.room.as_deref() == Some(room)
    }

    pub(crate) fn set_room(&mut self, room: &str) {
        self.room = Some(room.to_string());
    }
}

/// Users currently typing in the active room, in the order they started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypingRoster {
    users: Vec<String>,
}

impl TypingRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the user was already present.
    pub fn insert(&mut self, user: &str) -> bool {
        if self.contains(user) {
            return false;
        }
        self.users.push(user.to_string());
        true
    }

    /// Returns false if the user was not present.
    pub fn remove(&mut self, user: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u != user);
        self.users.len() != before
    }

    pub fn contains(&self, user: &str) -> bool {
        self.users.iter().any(|u| u == user)
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Typing indicator text, or None when the indicator should be hidden.
    pub fn summary(&self) -> Option<String> {
        match self.users.as_slice() {
            [] => None,
            [only] => Some(format!("{} is typing…", only)),
            [first, second] => Some(format!("{} and {} are typing…", first, second)),
            [first, rest @ ..] => Some(format!("{} and {} others are typing…", first, rest.len())),
        }
    }
}

/// Exponential backoff for reconnection: delay(k) = min(base * 2^k, cap).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.reconnect_base_delay,
            settings.reconnect_max_delay,
            settings.max_reconnect_attempts,
        )
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Delay before attempt number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Consumes one attempt and returns its delay, or None once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

// Local "am I typing" flag. The generation counter tags idle timers so only
// the most recently armed one takes effect.
#[derive(Debug, Default)]
pub(crate) struct TypingTracker {
    pub(crate) active: bool,
    generation: u64,
}

impl TypingTracker {
    pub(crate) fn rearm(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}
