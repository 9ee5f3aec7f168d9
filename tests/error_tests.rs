use std::error::Error;

use classroom_chat_rs::ChatError;

// Test ChatError display implementation
#[test]
fn test_chat_error_display() {
    let parse_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
    let err = ChatError::ParseFailed(parse_err);
    assert!(format!("{}", err).starts_with("JSON parsing failed"));

    let err = ChatError::InvalidResponse("Test invalid response".to_string());
    assert_eq!(
        format!("{}", err),
        "Invalid response: Test invalid response"
    );

    let err = ChatError::InvalidEndpoint("ftp://host".to_string());
    assert_eq!(format!("{}", err), "Invalid endpoint: ftp://host");

    assert_eq!(
        format!("{}", ChatError::EmptyMessage),
        "Message content is empty"
    );
    assert_eq!(format!("{}", ChatError::EmptyRoomName), "Room name is empty");
    assert_eq!(format!("{}", ChatError::NotInRoom), "No room joined");
    assert_eq!(
        format!("{}", ChatError::NotConnected),
        "Transport is not open"
    );
    assert_eq!(
        format!("{}", ChatError::SendFailed("channel closed".to_string())),
        "Sending frame failed: channel closed"
    );
    assert_eq!(
        format!("{}", ChatError::ClientStopped),
        "Chat client task is no longer running"
    );
}

// Test ChatError implements Error trait
#[test]
fn test_chat_error_trait() {
    let err = ChatError::NotConnected;

    fn takes_error(_: &dyn Error) {}
    takes_error(&err);
}

// Test conversions to ChatError
#[test]
fn test_chat_error_conversions() {
    let parse_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
    let err: ChatError = parse_err.into();
    assert!(matches!(err, ChatError::ParseFailed(_)));

    let ws_err = tokio_tungstenite::tungstenite::Error::ConnectionClosed;
    let err: ChatError = ws_err.into();
    assert!(matches!(err, ChatError::Transport(_)));
    assert!(err.source().is_some());
}

#[test]
fn test_error_classification() {
    assert!(ChatError::SendFailed("x".to_string()).is_recoverable());
    assert!(ChatError::InvalidResponse("x".to_string()).is_recoverable());
    assert!(!ChatError::ClientStopped.is_recoverable());
    assert!(!ChatError::EmptyMessage.is_recoverable());

    for err in [
        ChatError::EmptyMessage,
        ChatError::EmptyRoomName,
        ChatError::NotInRoom,
        ChatError::NotConnected,
    ] {
        assert!(err.is_rejected_input(), "{:?}", err);
    }
    assert!(!ChatError::SendFailed("x".to_string()).is_rejected_input());
}
