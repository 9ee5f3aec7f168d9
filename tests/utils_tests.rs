use chrono::{Duration, TimeZone, Utc};

use classroom_chat_rs::utils::{avatar_color, extract_links, initials, relative_time};
use classroom_chat_rs::{ChatMessage, MessageView};

#[test]
fn test_initials() {
    assert_eq!(initials("Alice"), "A");
    assert_eq!(initials("bob stone"), "BS");
    assert_eq!(initials("Mary Ann Lee"), "MA");
    assert_eq!(initials("  spaced  out"), "SO");
    assert_eq!(initials(""), "");
}

// Colours must match what the web widget picks for the same name
#[test]
fn test_avatar_color_matches_widget() {
    assert_eq!(avatar_color("Alice"), "#ef4444");
    assert_eq!(avatar_color("Bob"), "#22c55e");
    assert_eq!(avatar_color("System"), "#f97316");
    assert_eq!(avatar_color("Alice"), avatar_color("Alice"));
    // long names push the accumulator past 32 bits
    let long = "Professor Bartholomew Montgomery-Smythe the Third";
    assert!(avatar_color(long).starts_with('#'));
}

#[test]
fn test_extract_links() {
    assert_eq!(
        extract_links("slides at https://example.edu/s1 and http://x.io/a?b=c done"),
        vec![
            "https://example.edu/s1".to_string(),
            "http://x.io/a?b=c".to_string()
        ]
    );
    assert!(extract_links("no links, just ftp://old.host").is_empty());
}

#[test]
fn test_relative_time() {
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    assert_eq!(relative_time(now - Duration::seconds(5), now), "just now");
    assert_eq!(relative_time(now - Duration::minutes(5), now), "5m ago");
    assert_eq!(relative_time(now - Duration::hours(3), now), "3h ago");
    assert_eq!(relative_time(now - Duration::days(2), now), "2d ago");
    assert_eq!(relative_time(now - Duration::days(30), now), "2024-04-10");
    // clock skew into the future still reads as fresh
    assert_eq!(relative_time(now + Duration::seconds(30), now), "just now");
}

#[test]
fn test_message_view() {
    let mut message = ChatMessage::new("room1", "Alice", "hi");
    message.timestamp = Some(Utc.with_ymd_and_hms(2024, 5, 10, 11, 0, 0).unwrap());
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    let view = MessageView::new(&message, "Alice");
    assert!(view.own);
    assert_eq!(view.initials, "A");
    assert_eq!(view.avatar_color, "#ef4444");
    assert!(view.links.is_empty());
    assert_eq!(view.relative_time(now).as_deref(), Some("1h ago"));

    let view = MessageView::new(&message, "Bob");
    assert!(!view.own);

    // System messages are never "own", even with a matching name
    let system = ChatMessage::system("room1", "Welcome");
    assert!(!MessageView::new(&system, "System").own);
}
