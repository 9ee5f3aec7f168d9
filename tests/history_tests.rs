use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use classroom_chat_rs::{
    ChatError, Endpoint, HistoryFetcher, HttpHistoryFetcher, Settings, WelcomeHistory,
};

// Serves one canned HTTP response and records the request head.
async fn serve_once(status: &'static str, body: &'static str) -> (String, Arc<Mutex<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(String::new()));
    let seen_by_server = seen.clone();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.unwrap();
        *seen_by_server.lock().await = String::from_utf8_lossy(&buf[..n]).to_string();

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    (origin, seen)
}

fn fetcher(origin: &str, token: Option<&str>) -> HttpHistoryFetcher {
    HttpHistoryFetcher::new(
        Endpoint::from_origin(origin).unwrap(),
        token.map(str::to_string),
        &Settings::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_welcome_history() {
    let batch = WelcomeHistory.fetch("room1").await.unwrap();

    assert_eq!(batch.len(), 1);
    assert!(batch[0].is_system());
    assert_eq!(batch[0].content, "Welcome to room1!");
    assert!(batch[0].belongs_to("room1"));
    assert_eq!(batch[0].id, Some(1));
    assert!(batch[0].timestamp.unwrap() < chrono::Utc::now());
}

#[tokio::test]
async fn test_request_url_encodes_room() {
    let fetcher = fetcher("https://chat.example.edu", None);
    assert_eq!(
        fetcher.request_url("study group #1").unwrap(),
        "https://chat.example.edu/api/v1/messages?room=study+group+%231"
    );
}

#[tokio::test]
async fn test_http_history_success() {
    let (origin, seen) = serve_once(
        "200 OK",
        r#"{"success":true,"data":[
            {"id":1,"type":"system","content":"Welcome","username":"System","created_at":"2024-05-01T09:00:00Z"},
            {"id":2,"type":"message","content":"hi","username":"Bob","created_at":"2024-05-01T09:01:00Z"}
        ]}"#,
    )
    .await;

    let batch = fetcher(&origin, Some("secret-token"))
        .fetch("room1")
        .await
        .unwrap();

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].content, "Welcome");
    assert_eq!(batch[1].sender, "Bob");
    assert!(batch.iter().all(|m| m.belongs_to("room1")));

    let request = seen.lock().await.clone();
    assert!(request.starts_with("GET /api/v1/messages?room=room1 HTTP/1.1"));
    assert!(request
        .to_ascii_lowercase()
        .contains("authorization: bearer secret-token"));
}

#[tokio::test]
async fn test_http_history_api_error() {
    let (origin, _seen) = serve_once(
        "200 OK",
        r#"{"success":false,"error":{"code":"FORBIDDEN","message":"Not a member"}}"#,
    )
    .await;

    let result = fetcher(&origin, None).fetch("room1").await;
    match result {
        Err(ChatError::InvalidResponse(msg)) => assert_eq!(msg, "FORBIDDEN: Not a member"),
        other => panic!("Expected InvalidResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_history_bad_status() {
    let (origin, _seen) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;

    let result = fetcher(&origin, None).fetch("room1").await;
    assert!(matches!(result, Err(ChatError::InvalidResponse(_))));
    assert!(result.unwrap_err().is_recoverable());
}
