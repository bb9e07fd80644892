/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities: auth mock, in-process feed server, client builders
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for intrinio-realtime tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use intrinio_realtime::{ClientConfig, Credentials, Provider, RealtimeClient};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "test-user";
pub const PASSWORD: &str = "test-password";
const EVENT_WAIT: Duration = Duration::from_secs(5);

/// Setup a mock auth server answering `GET /auth` with [`mock_token`]
pub async fn setup_auth_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(basic_auth(USERNAME, PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_string(mock_token()))
        .mount(&server)
        .await;
    server
}

/// Mock bearer token for testing
pub fn mock_token() -> String {
    "mock-realtime-token".to_string()
}

pub fn credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

/// Config pointing at the mocks; heartbeats are pushed out of the way.
pub fn test_config(auth: &MockServer, feed: &MockFeed) -> ClientConfig {
    ClientConfig::default()
        .with_endpoints(format!("{}/auth", auth.uri()), feed.url())
        .with_heartbeat_interval(Duration::from_secs(60))
}

pub fn test_client(provider: Provider, config: ClientConfig) -> RealtimeClient {
    RealtimeClient::with_config(credentials(), provider, config).expect("client init")
}

/// What the feed server observed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected { uri: String },
    Frame(Value),
    Closed,
}

#[derive(Debug)]
enum FeedCommand {
    Send(String),
    Close(CloseCode),
    Drop,
}

/// In-process websocket server accepting one connection at a time.
pub struct MockFeed {
    addr: SocketAddr,
    events: mpsc::UnboundedReceiver<FeedEvent>,
    commands: mpsc::UnboundedSender<FeedCommand>,
}

impl MockFeed {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind feed");
        let addr = listener.local_addr().expect("feed addr");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handshake_events = events_tx.clone();
                let callback = move |request: &Request, response: Response| {
                    let _ = handshake_events.send(FeedEvent::Connected {
                        uri: request.uri().to_string(),
                    });
                    Ok::<Response, ErrorResponse>(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };
                serve(&mut ws, &events_tx, &mut commands_rx).await;
                let _ = events_tx.send(FeedEvent::Closed);
            }
        });

        Self {
            addr,
            events: events_rx,
            commands: commands_tx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/socket", self.addr)
    }

    pub fn send_json(&self, value: Value) {
        self.commands
            .send(FeedCommand::Send(value.to_string()))
            .expect("feed running");
    }

    pub fn send_text(&self, text: &str) {
        self.commands
            .send(FeedCommand::Send(text.to_string()))
            .expect("feed running");
    }

    /// Close handshake initiated by the server.
    pub fn close_with(&self, code: CloseCode) {
        self.commands
            .send(FeedCommand::Close(code))
            .expect("feed running");
    }

    /// Drop the TCP connection without a close handshake.
    pub fn drop_connection(&self) {
        self.commands.send(FeedCommand::Drop).expect("feed running");
    }

    pub async fn next_event(&mut self) -> FeedEvent {
        timeout(EVENT_WAIT, self.events.recv())
            .await
            .expect("feed event within deadline")
            .expect("feed running")
    }

    /// Wait for the next client connection and return its request URI.
    pub async fn expect_connection(&mut self) -> String {
        match self.next_event().await {
            FeedEvent::Connected { uri } => uri,
            other => panic!("expected connection, got {other:?}"),
        }
    }

    /// Next `count` non-heartbeat frames.
    pub async fn expect_frames(&mut self, count: usize) -> Vec<Value> {
        let mut frames = Vec::with_capacity(count);
        while frames.len() < count {
            match self.next_event().await {
                FeedEvent::Frame(frame) if is_heartbeat(&frame) => {}
                FeedEvent::Frame(frame) => frames.push(frame),
                other => panic!("expected frame, got {other:?}"),
            }
        }
        frames
    }

    /// Every frame up to the end of the current connection.
    pub async fn frames_until_closed(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        loop {
            match self.next_event().await {
                FeedEvent::Frame(frame) => frames.push(frame),
                FeedEvent::Closed => return frames,
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    /// Events seen within `window`, without failing when none arrive.
    pub async fn collect_for(&mut self, window: Duration) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            events.push(event);
        }
        events
    }
}

pub fn is_heartbeat(frame: &Value) -> bool {
    frame.get("event").and_then(Value::as_str) == Some("heartbeat")
}

async fn serve(
    ws: &mut WebSocketStream<TcpStream>,
    events: &mpsc::UnboundedSender<FeedEvent>,
    commands: &mut mpsc::UnboundedReceiver<FeedCommand>,
) {
    loop {
        tokio::select! {
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                        let _ = events.send(FeedEvent::Frame(value));
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            },
            command = commands.recv() => match command {
                Some(FeedCommand::Send(text)) => {
                    if ws.send(Message::text(text)).await.is_err() {
                        return;
                    }
                }
                Some(FeedCommand::Close(code)) => {
                    let frame = CloseFrame { code, reason: "closed by test".into() };
                    if ws.close(Some(frame)).await.is_err() {
                        return;
                    }
                }
                Some(FeedCommand::Drop) | None => return,
            },
        }
    }
}
