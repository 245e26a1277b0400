//! End-to-end tests over real WebSocket connections.
//!
//! Each test boots the full router and dispatcher on a loopback port and
//! drives it with `tokio-tungstenite` clients.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use geodrop_core::protocol::{DeliveredChat, ServerFrame};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use common::{build_test_app, chat_frame, list_ids, location_frame, test_config};
use geodrop_api::state::AppState;
use geodrop_api::ws::Dispatcher;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    cancel: CancellationToken,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::new(test_config());
        let cancel = CancellationToken::new();

        let dispatcher = Dispatcher::new(
            Arc::clone(&state.registry),
            state.config.proximity_threshold_meters,
        );
        tokio::spawn(dispatcher.run(cancel.clone()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let app = build_test_app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server runs");
        });

        Self { addr, state, cancel }
    }

    async fn connect(&self, path: &str) -> Client {
        let (client, _response) = connect_async(format!("ws://{}{}", self.addr, path))
            .await
            .expect("websocket handshake");
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn send_text(client: &mut Client, text: String) {
    client
        .send(Message::Text(text))
        .await
        .expect("send should succeed");
}

/// Read server frames until one satisfies `accept`, skipping the rest.
async fn wait_for<F>(client: &mut Client, mut accept: F) -> ServerFrame
where
    F: FnMut(&ServerFrame) -> bool,
{
    let wait = async {
        loop {
            let msg = client
                .next()
                .await
                .expect("connection ended")
                .expect("websocket error");
            let Message::Text(text) = msg else { continue };
            let frame: ServerFrame =
                serde_json::from_str(&text).expect("server sent an invalid frame");
            if accept(&frame) {
                return frame;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .expect("timed out waiting for a matching frame")
}

async fn wait_for_list(client: &mut Client, expected: &[&str]) {
    wait_for(client, |frame| {
        matches!(frame, ServerFrame::UpdateList(_)) && list_ids(frame) == expected
    })
    .await;
}

// ---------------------------------------------------------------------------
// Test: two nearby clients discover each other and chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nearby_clients_discover_each_other_and_chat() {
    let server = TestServer::start().await;
    let mut a = server.connect("/ws").await;
    let mut b = server.connect("/").await;

    send_text(&mut a, location_frame("A", 37.0, -122.0)).await;
    send_text(&mut b, location_frame("B", 37.0005, -122.0)).await;

    wait_for_list(&mut a, &["B"]).await;
    wait_for_list(&mut b, &["A"]).await;

    send_text(&mut a, chat_frame("A", "B", "hi")).await;
    let frame = wait_for(&mut b, |frame| matches!(frame, ServerFrame::ChatMessage(_))).await;
    assert_eq!(
        frame,
        ServerFrame::ChatMessage(DeliveredChat {
            from: "A".into(),
            text: Some("hi".into()),
            file: None,
            timestamp: 1_700_000_000_000,
        })
    );
}

// ---------------------------------------------------------------------------
// Test: distant clients receive empty lists
// ---------------------------------------------------------------------------

#[tokio::test]
async fn distant_clients_do_not_see_each_other() {
    let server = TestServer::start().await;
    let mut a = server.connect("/ws").await;
    let mut b = server.connect("/ws").await;

    send_text(&mut a, location_frame("A", 0.0, 0.0)).await;
    send_text(&mut b, location_frame("B", 10.0, 10.0)).await;

    wait_for_list(&mut b, &[]).await;
    assert_eq!(server.state.registry.session_count().await, 2);
    wait_for_list(&mut a, &[]).await;
}

// ---------------------------------------------------------------------------
// Test: a malformed frame is dropped without closing the socket
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let server = TestServer::start().await;
    let mut a = server.connect("/ws").await;
    let mut b = server.connect("/ws").await;

    send_text(&mut a, location_frame("A", 0.0, 0.0)).await;
    send_text(&mut b, location_frame("B", 0.0, 0.0001)).await;
    wait_for_list(&mut a, &["B"]).await;

    send_text(&mut a, "{not json".to_string()).await;
    send_text(&mut a, chat_frame("A", "B", "still here")).await;

    let frame = wait_for(&mut b, |frame| matches!(frame, ServerFrame::ChatMessage(_))).await;
    let ServerFrame::ChatMessage(chat) = frame else {
        unreachable!()
    };
    assert_eq!(chat.text.as_deref(), Some("still here"));
}

// ---------------------------------------------------------------------------
// Test: a disconnect removes the session and the peer's list updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_removes_session_from_peer_lists() {
    let server = TestServer::start().await;
    let mut a = server.connect("/ws").await;
    let mut b = server.connect("/ws").await;

    send_text(&mut a, location_frame("A", 0.0, 0.0)).await;
    send_text(&mut b, location_frame("B", 0.0, 0.0001)).await;
    wait_for_list(&mut a, &["B"]).await;

    b.close(None).await.expect("close handshake");
    drop(b);

    wait_for_list(&mut a, &[]).await;
    assert!(server.state.registry.get("B").await.is_none());
    assert_eq!(server.state.registry.session_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: reconnecting under the same id closes the older socket
// ---------------------------------------------------------------------------

#[tokio::test]
async fn newer_connection_takes_over_session_id() {
    let server = TestServer::start().await;
    let mut old = server.connect("/ws").await;
    let mut new = server.connect("/ws").await;

    send_text(&mut old, location_frame("A", 0.0, 0.0)).await;
    wait_for_list(&mut old, &[]).await;

    send_text(&mut new, location_frame("A", 0.0, 0.0)).await;
    wait_for_list(&mut new, &[]).await;

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match old.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "old socket should be closed");

    assert_eq!(server.state.registry.session_count().await, 1);
    assert!(server.state.registry.get("A").await.is_some());
}
