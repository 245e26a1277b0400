use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::FrameRejection;
use crate::state::AppState;
use crate::ws::connection::Connection;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is driven by [`handle_socket`] until
/// either side closes it.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let ws = match state.config.ws_max_message_bytes {
        Some(max) => ws.max_message_size(max),
        None => ws,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Spawns a sender task that drains the connection's outbound channel.
///   2. Feeds inbound text frames to a [`Connection`] on the current task.
///   3. Stops when the peer closes, the stream errors, or the sender task
///      ends (a Close was forwarded or the sink failed).
///   4. Closes the [`Connection`], which removes its session.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut connection = Connection::new(
        conn_id.clone(),
        tx,
        Arc::clone(&state.registry),
        state.router.clone(),
    );

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                tracing::debug!(conn_id = %sender_conn_id, "Close frame sent");
                break;
            }
        }
    });

    // Receiver loop: process inbound messages.
    loop {
        tokio::select! {
            _ = &mut send_task => break,
            next = stream.next() => {
                let msg = match next {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                        break;
                    }
                    None => break,
                };

                let result = match msg {
                    Message::Text(text) => connection.handle_text(text.as_str()).await.map(|_| ()),
                    Message::Binary(_) => Err(FrameRejection::BinaryFrame),
                    Message::Close(_) => break,
                    Message::Pong(_) => {
                        tracing::trace!(conn_id = %conn_id, "Pong received");
                        Ok(())
                    }
                    // Answered by axum.
                    Message::Ping(_) => Ok(()),
                };

                if let Err(rejection) = result {
                    if rejection.is_identity_violation() {
                        tracing::warn!(conn_id = %conn_id, error = %rejection, "Dropped inbound frame");
                    } else {
                        tracing::debug!(conn_id = %conn_id, error = %rejection, "Dropped inbound frame");
                    }
                }
            }
        }
    }

    // Clean up: remove the session and abort the sender task.
    connection.close().await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
