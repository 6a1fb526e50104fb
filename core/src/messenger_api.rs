/// Messenger REST API + SSE: local HTTP bridge for an external renderer
///
/// Endpoints:
///   GET    /api/status
///   GET    /api/onboarding
///   POST   /api/onboarding/next
///   POST   /api/onboarding/back
///   GET    /api/conversations               ?q=...&filter=all|unread|pinned|groups
///   GET    /api/conversations/:id           opens the thread, marks it read
///   POST   /api/conversations/:id/send      body: {"text":"...","reply_to":null}
///   POST   /api/conversations/:id/react     body: {"message_id":"...","emoji":"..."}
///   POST   /api/conversations/:id/typing    body: {"active":true}
///   POST   /api/conversations/:id/pin       body: {"pinned":true}
///   POST   /api/conversations/:id/draft     body: {"text":"..."}
///   POST   /api/conversations/:id/close     renderer left the thread
///   GET    /api/media                       ?q=...&filter=...&sort=date|name|size
///   DELETE /api/media/:id
///   GET    /api/settings
///   PUT    /api/settings/preferences        body: {"key":"read_receipts","value":false}
///   DELETE /api/settings/devices/:id
///   GET    /events                          SSE stream of ChatEvent JSON
use crate::client::Client;
use crate::conversation_store::ConversationFilter;
use crate::error::{ChatError, Result};
use crate::media_catalog::{MediaFilter, SortKey};
use crate::messenger_types::ChatEvent;
use crate::settings::PreferenceKey;
use futures_util::stream::{unfold, StreamExt};
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

// ─── Type alias ──────────────────────────────────────────────────────────────

type BoxBody = http_body_util::combinators::BoxBody<bytes::Bytes, Infallible>;
type Resp = Response<BoxBody>;

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn cors_headers(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
}

fn json_resp(status: StatusCode, body: Vec<u8>) -> Resp {
    cors_headers(Response::builder())
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(bytes::Bytes::from(body)).boxed())
        .unwrap_or_else(|_| Response::new(Full::new(bytes::Bytes::new()).boxed()))
}

fn json_ok(value: serde_json::Value) -> Resp {
    json_resp(StatusCode::OK, serde_json::to_vec(&value).unwrap_or_default())
}

fn json_err(status: StatusCode, msg: &str) -> Resp {
    json_resp(
        status,
        serde_json::to_vec(&serde_json::json!({ "error": msg })).unwrap_or_default(),
    )
}

/// Map a core error onto an HTTP status
pub fn error_status(e: &ChatError) -> StatusCode {
    match e {
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ChatError::InvalidTransition { .. } => StatusCode::CONFLICT,
        ChatError::OnboardingRequired => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn chat_err(e: ChatError) -> Resp {
    json_err(error_status(&e), &e.to_string())
}

fn sse_resp(rx: tokio::sync::broadcast::Receiver<ChatEvent>) -> Resp {
    // Keepalive comment sent immediately so the client knows the connection is live
    let initial = bytes::Bytes::from(": connected\n\n");
    let first = futures_util::stream::once(async move {
        Ok::<Frame<bytes::Bytes>, Infallible>(Frame::data(initial))
    });

    let events = unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    let data = format!("data: {}\n\n", json);
                    let frame = Frame::data(bytes::Bytes::from(data));
                    return Some((Ok::<_, Infallible>(frame), rx));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    // Slow client: skip lagged events and continue
                    tracing::warn!("SSE client lagged {} events", n);
                    continue;
                }
                Err(_) => return None, // channel closed
            }
        }
    });

    let stream = first.chain(events);
    cors_headers(Response::builder())
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream; charset=utf-8")
        .header("Cache-Control", "no-cache")
        .header("X-Accel-Buffering", "no") // disable nginx buffering
        .body(StreamBody::new(stream).boxed())
        .unwrap_or_else(|_| Response::new(Full::new(bytes::Bytes::new()).boxed()))
}

// ─── Entry point ─────────────────────────────────────────────────────────────

pub async fn start_messenger_api(client: Client, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Messenger API started on http://{}", addr);
    serve(client, listener).await
}

/// Accept loop on an already bound listener
pub async fn serve(client: Client, listener: TcpListener) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                let io = TokioIo::new(stream);
                let client = client.clone();
                tokio::spawn(async move {
                    let svc = service_fn(move |req| {
                        let client = client.clone();
                        async move { Ok::<_, Infallible>(handle(req, client).await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                        // Ignore client-disconnect errors (normal for SSE)
                        if !e.is_incomplete_message() {
                            error!("Messenger API connection error: {:?}", e);
                        }
                    }
                });
            }
            Err(e) => error!("Messenger API accept error: {}", e),
        }
    }
}

// ─── Router ──────────────────────────────────────────────────────────────────

async fn handle(req: Request<hyper::body::Incoming>, client: Client) -> Resp {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    // CORS preflight
    if method == Method::OPTIONS {
        return cors_headers(Response::builder())
            .status(StatusCode::NO_CONTENT)
            .body(Full::new(bytes::Bytes::new()).boxed())
            .unwrap_or_else(|_| Response::new(Full::new(bytes::Bytes::new()).boxed()));
    }

    match (method.clone(), path.as_str()) {
        (Method::GET, "/api/status") => get_status(&client).await,
        (Method::GET, "/api/onboarding") => get_onboarding(&client).await,
        (Method::POST, "/api/onboarding/next") => post_onboarding_next(&client).await,
        (Method::POST, "/api/onboarding/back") => post_onboarding_back(&client).await,
        (Method::GET, "/api/conversations") => get_conversations(&query, &client).await,
        (Method::GET, "/api/media") => get_media(&query, &client).await,
        (Method::GET, "/api/settings") => get_settings(&client).await,
        (Method::PUT, "/api/settings/preferences") => put_preference(req, &client).await,
        (Method::GET, "/events") => get_sse(&client),
        _ => {
            // Dynamic segments
            if let Some(rest) = path.strip_prefix("/api/conversations/") {
                let (id, action) = match rest.split_once('/') {
                    Some((id, action)) => (decode(id), Some(action)),
                    None => (decode(rest), None),
                };
                return match (method, action) {
                    (Method::GET, None) => get_thread(&id, &client).await,
                    (Method::POST, Some("send")) => post_send(req, &id, &client).await,
                    (Method::POST, Some("react")) => post_react(req, &id, &client).await,
                    (Method::POST, Some("typing")) => post_typing(req, &id, &client).await,
                    (Method::POST, Some("pin")) => post_pin(req, &id, &client).await,
                    (Method::POST, Some("draft")) => post_draft(req, &id, &client).await,
                    (Method::POST, Some("close")) => post_close(&id, &client).await,
                    _ => json_err(StatusCode::NOT_FOUND, "not found"),
                };
            }
            if method == Method::DELETE && path.starts_with("/api/media/") {
                let id = decode(path.trim_start_matches("/api/media/"));
                return delete_media(&id, &client).await;
            }
            if method == Method::DELETE && path.starts_with("/api/settings/devices/") {
                let id = decode(path.trim_start_matches("/api/settings/devices/"));
                return delete_device(&id, &client).await;
            }
            json_err(StatusCode::NOT_FOUND, "not found")
        }
    }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn get_status(client: &Client) -> Resp {
    json_ok(serde_json::json!({
        "user_id": client.local_user().await,
        "onboarded": client.is_onboarded().await,
    }))
}

async fn get_onboarding(client: &Client) -> Resp {
    match client.onboarding().await {
        Some(view) => json_ok(serde_json::json!({ "onboarding": view })),
        None => json_ok(serde_json::json!({ "onboarding": null, "completed": true })),
    }
}

async fn post_onboarding_next(client: &Client) -> Resp {
    match client.advance_onboarding().await {
        Ok(transition) => json_ok(serde_json::json!({ "transition": transition })),
        Err(e) => chat_err(e),
    }
}

async fn post_onboarding_back(client: &Client) -> Resp {
    let transition = client.retreat_onboarding().await;
    json_ok(serde_json::json!({ "transition": transition }))
}

async fn get_conversations(query: &str, client: &Client) -> Resp {
    let search = query_param(query, "q").unwrap_or_default();
    let filter = match query_param(query, "filter")
        .unwrap_or_default()
        .parse::<ConversationFilter>()
    {
        Ok(f) => f,
        Err(e) => return chat_err(e),
    };
    match client.conversations(&search, filter).await {
        Ok(convs) => json_ok(serde_json::json!({ "conversations": convs })),
        Err(e) => chat_err(e),
    }
}

async fn get_thread(id: &str, client: &Client) -> Resp {
    match client.open_thread(id).await {
        Ok(Some(view)) => json_ok(serde_json::json!({ "thread": view })),
        Ok(None) => json_err(StatusCode::NOT_FOUND, "Chat not found"),
        Err(e) => chat_err(e),
    }
}

#[derive(Deserialize)]
struct SendRequest {
    text: String,
    reply_to: Option<String>,
}

async fn post_send(req: Request<hyper::body::Incoming>, id: &str, client: &Client) -> Resp {
    let r: SendRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let sent = match r.reply_to {
        Some(target) => client.reply(id, &target, &r.text).await,
        None => client.send(id, &r.text).await,
    };
    match sent {
        Ok(message) => json_ok(serde_json::json!({ "message": message })),
        Err(e) => chat_err(e),
    }
}

#[derive(Deserialize)]
struct ReactRequest {
    message_id: String,
    emoji: String,
}

async fn post_react(req: Request<hyper::body::Incoming>, id: &str, client: &Client) -> Resp {
    let r: ReactRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let user = client.local_user().await;
    match client.react(id, &r.message_id, &r.emoji, &user).await {
        Ok(added) => json_ok(serde_json::json!({ "added": added })),
        Err(e) => chat_err(e),
    }
}

#[derive(Deserialize)]
struct TypingRequest {
    active: bool,
}

async fn post_typing(req: Request<hyper::body::Incoming>, id: &str, client: &Client) -> Resp {
    let r: TypingRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match client.set_typing(id, r.active).await {
        Ok(()) => json_ok(serde_json::json!({ "typing": r.active })),
        Err(e) => chat_err(e),
    }
}

#[derive(Deserialize)]
struct PinRequest {
    pinned: bool,
}

async fn post_pin(req: Request<hyper::body::Incoming>, id: &str, client: &Client) -> Resp {
    let r: PinRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    if client.conversation(id).await.is_none() {
        return json_err(StatusCode::NOT_FOUND, "Chat not found");
    }
    match client.set_pinned(id, r.pinned).await {
        Ok(()) => json_ok(serde_json::json!({ "pinned": r.pinned })),
        Err(e) => chat_err(e),
    }
}

#[derive(Deserialize)]
struct DraftRequest {
    text: String,
}

async fn post_draft(req: Request<hyper::body::Incoming>, id: &str, client: &Client) -> Resp {
    let r: DraftRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match client.compose(id, &r.text).await {
        Ok(()) => json_ok(serde_json::json!({ "draft": r.text })),
        Err(e) => chat_err(e),
    }
}

async fn post_close(id: &str, client: &Client) -> Resp {
    let closed = client.close_thread(id).await;
    json_ok(serde_json::json!({ "closed": closed }))
}

async fn get_media(query: &str, client: &Client) -> Resp {
    let search = query_param(query, "q").unwrap_or_default();
    let filter = query_param(query, "filter").unwrap_or_default().parse::<MediaFilter>();
    let sort = query_param(query, "sort").unwrap_or_default().parse::<SortKey>();
    let (filter, sort) = match (filter, sort) {
        (Ok(f), Ok(s)) => (f, s),
        (Err(e), _) | (_, Err(e)) => return chat_err(e),
    };
    match client.media(&search, filter, sort).await {
        Ok(files) => {
            let files: Vec<_> = files
                .into_iter()
                .map(|f| {
                    let size = f.size_display();
                    serde_json::json!({ "file": f, "size": size })
                })
                .collect();
            json_ok(serde_json::json!({
                "files": files,
                "counts": client.media_counts().await,
            }))
        }
        Err(e) => chat_err(e),
    }
}

async fn delete_media(id: &str, client: &Client) -> Resp {
    match client.remove_media(id).await {
        Ok(removed) => json_ok(serde_json::json!({ "removed": removed.is_some() })),
        Err(e) => chat_err(e),
    }
}

async fn get_settings(client: &Client) -> Resp {
    json_ok(serde_json::json!({
        "preferences": client.preferences().await,
        "devices": client.devices().await,
    }))
}

#[derive(Deserialize)]
struct PreferenceRequest {
    key: PreferenceKey,
    value: bool,
}

async fn put_preference(req: Request<hyper::body::Incoming>, client: &Client) -> Resp {
    let r: PreferenceRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match client.set_preference(r.key, r.value).await {
        Ok(prefs) => json_ok(serde_json::json!({ "preferences": prefs })),
        Err(e) => chat_err(e),
    }
}

async fn delete_device(id: &str, client: &Client) -> Resp {
    match client.remove_device(id).await {
        Ok(device) => json_ok(serde_json::json!({ "removed": device })),
        Err(e) => chat_err(e),
    }
}

fn get_sse(client: &Client) -> Resp {
    sse_resp(client.subscribe())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

async fn read_json<T: DeserializeOwned>(
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<T, Resp> {
    let body = req
        .collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| json_err(StatusCode::BAD_REQUEST, &format!("body read error: {}", e)))?;
    serde_json::from_slice(&body)
        .map_err(|e| json_err(StatusCode::BAD_REQUEST, &format!("invalid JSON: {}", e)))
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

fn query_param(query: &str, key: &str) -> Option<String> {
    for pair in query.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            if k == key {
                return Some(decode(&v.replace('+', " ")));
            }
        }
    }
    None
}
