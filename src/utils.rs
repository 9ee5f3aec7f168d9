use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::ChatMessage;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"https?://[^\s]+").unwrap();
}

const AVATAR_COLORS: [&str; 16] = [
    "#ef4444", "#f97316", "#f59e0b", "#eab308", "#84cc16", "#22c55e", "#10b981", "#14b8a6",
    "#06b6d4", "#0ea5e9", "#3b82f6", "#6366f1", "#8b5cf6", "#a855f7", "#d946ef", "#ec4899",
];

/// A chat message with the presentation data a renderer needs already worked out.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub message: ChatMessage,
    pub own: bool,
    pub initials: String,
    pub avatar_color: &'static str,
    pub links: Vec<String>,
}

impl MessageView {
    pub fn new(message: &ChatMessage, local_username: &str) -> Self {
        Self {
            own: !message.is_system() && message.sender == local_username,
            initials: initials(&message.sender),
            avatar_color: avatar_color(&message.sender),
            links: extract_links(&message.content),
            message: message.clone(),
        }
    }

    pub fn relative_time(&self, now: DateTime<Utc>) -> Option<String> {
        self.message.timestamp.map(|ts| relative_time(ts, now))
    }
}

/// Up to two uppercase initials, one per space-separated word.
pub fn initials(name: &str) -> String {
    name.split(' ')
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

// Stable per-name colour; same string hash as the web widget so a user keeps
// their colour across clients. Only the shift wraps to 32 bits there, the
// accumulator itself does not.
pub fn avatar_color(name: &str) -> &'static str {
    let hash = name.encode_utf16().fold(0i64, |hash, unit| {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        i64::from(unit) + shifted - hash
    });
    AVATAR_COLORS[(hash.unsigned_abs() % AVATAR_COLORS.len() as u64) as usize]
}

pub fn extract_links(content: &str) -> Vec<String> {
    URL_RE
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// "just now", "5m ago", "3h ago", "2d ago", then the plain date.
pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(timestamp);
    if diff.num_seconds() < 60 {
        "just now".to_string()
    } else if diff.num_minutes() < 60 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_hours() < 24 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 7 {
        format!("{}d ago", diff.num_days())
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}
