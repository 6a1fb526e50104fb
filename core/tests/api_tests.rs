/// Messenger API tests over a real socket
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use whisperly_core::message_thread::{Direction, Message, MessageStatus};
use whisperly_core::messenger_api::serve;
use whisperly_core::seed::SeedSnapshot;
use whisperly_core::session_store::SessionStore;
use whisperly_core::Client;

async fn start() -> (Client, std::net::SocketAddr) {
    let client = Client::new(
        SeedSnapshot::builtin(),
        SessionStore::temporary().unwrap(),
        "me",
    )
    .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = client.clone();
    tokio::spawn(async move {
        let _ = serve(server, listener).await;
    });
    (client, addr)
}

/// Minimal HTTP/1.1 request; returns (status, JSON body)
async fn request(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    body: Option<serde_json::Value>,
) -> (u16, serde_json::Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = body.map(|b| b.to_string()).unwrap_or_default();
    let req = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        method,
        path,
        body.len(),
        body
    );
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&raw);
    let status: u16 = text
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    let json = text
        .split_once("\r\n\r\n")
        .map(|(_, b)| b)
        .and_then(|b| serde_json::from_str(b).ok())
        .unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_onboarding_gate_over_http() {
    let (_client, addr) = start().await;

    let (status, _) = request(addr, "GET", "/api/conversations", None).await;
    assert_eq!(status, 403);

    for _ in 0..4 {
        let (status, _) = request(addr, "POST", "/api/onboarding/next", None).await;
        assert_eq!(status, 200);
    }
    let (status, body) = request(addr, "GET", "/api/status", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["onboarded"], true);

    let (status, body) = request(addr, "GET", "/api/conversations?filter=unread", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["conversations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_send_react_and_errors_over_http() {
    let (client, addr) = start().await;
    while client.advance_onboarding().await.unwrap()
        != whisperly_core::onboarding::Transition::Completed
    {}

    let (status, body) = request(
        addr,
        "POST",
        "/api/conversations/1/send",
        Some(serde_json::json!({ "text": "hello", "reply_to": "2" })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"]["status"], "sending");
    assert_eq!(body["message"]["reply_to"], "2");

    let (status, _) = request(
        addr,
        "POST",
        "/api/conversations/1/send",
        Some(serde_json::json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, 400);

    let (status, body) = request(
        addr,
        "POST",
        "/api/conversations/1/react",
        Some(serde_json::json!({ "message_id": "1", "emoji": "👍" })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["added"], true);

    let (status, _) = request(
        addr,
        "POST",
        "/api/conversations/1/react",
        Some(serde_json::json!({ "message_id": "nope", "emoji": "👍" })),
    )
    .await;
    assert_eq!(status, 404);

    let (status, body) = request(addr, "GET", "/api/conversations/1", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["thread"]["conversation"]["unread_count"], 0);
    assert_eq!(body["thread"]["messages"].as_array().unwrap().len(), 5);

    let (status, body) = request(addr, "GET", "/api/conversations/999", None).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Chat not found");
}

#[tokio::test]
async fn test_media_endpoints() {
    let (client, addr) = start().await;
    while client.advance_onboarding().await.unwrap()
        != whisperly_core::onboarding::Transition::Completed
    {}

    let (status, body) = request(addr, "GET", "/api/media?filter=images&sort=size", None).await;
    assert_eq!(status, 200);
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["file"]["name"], "vacation-pics.jpg");
    assert_eq!(files[0]["size"], "3.2 MB");

    let (status, _) = request(addr, "GET", "/api/media?sort=colour", None).await;
    assert_eq!(status, 400);

    let (status, body) = request(addr, "DELETE", "/api/media/5", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["removed"], true);

    let (status, body) = request(addr, "DELETE", "/api/settings/devices/1", None).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("current device"));
}

#[tokio::test]
async fn test_pin_draft_and_close_over_http() {
    let (client, addr) = start().await;
    while client.advance_onboarding().await.unwrap()
        != whisperly_core::onboarding::Transition::Completed
    {}

    let (status, _) = request(
        addr,
        "POST",
        "/api/conversations/4/pin",
        Some(serde_json::json!({ "pinned": true })),
    )
    .await;
    assert_eq!(status, 200);
    let (_, body) = request(addr, "GET", "/api/conversations?filter=pinned", None).await;
    let ids: Vec<&str> = body["conversations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["id"].as_str())
        .collect();
    assert!(ids.contains(&"4"));

    let (status, _) = request(
        addr,
        "POST",
        "/api/conversations/nope/pin",
        Some(serde_json::json!({ "pinned": true })),
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = request(
        addr,
        "POST",
        "/api/conversations/5/draft",
        Some(serde_json::json!({ "text": "brb" })),
    )
    .await;
    assert_eq!(status, 200);
    let (_, body) = request(addr, "GET", "/api/conversations/5", None).await;
    assert_eq!(body["thread"]["draft"], "brb");

    // Leaving the thread makes incoming messages count as unread again
    let (status, body) = request(addr, "POST", "/api/conversations/5/close", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["closed"], true);
    let incoming = Message {
        id: "in-1".to_string(),
        content: "ping".to_string(),
        timestamp: chrono::Utc::now(),
        sender_id: "jake".to_string(),
        direction: Direction::Received,
        status: MessageStatus::Delivered,
        reactions: Vec::new(),
        reply_to: None,
    };
    client.receive_message("5", incoming).await.unwrap();
    assert_eq!(client.conversation("5").await.unwrap().unread_count, 1);
}
