//! WebSocket glue between axum sockets and the [`ConnectionHub`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};

use super::AppState;
use crate::hub::{ConnectionHub, ConnectionId};

/// Removes the peer from the hub on every exit path, including panics and
/// cancellation of the socket task.
struct ConnectionGuard {
    hub: Arc<ConnectionHub>,
    id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

pub(super) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>) {
    let (id, mut outbox) = hub.register();
    let _guard = ConnectionGuard {
        hub: hub.clone(),
        id,
    };

    let (mut sink, mut stream) = socket.split();

    // Drain this peer's queue into the socket; ends when the hub drops the
    // queue or the peer stops accepting writes
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection = id, "Outbound side closed");
        }
        _ = read_loop(&hub, id, &mut stream) => {}
    }

    send_task.abort();
}

/// Process inbound frames in receipt order until the peer closes or errors.
async fn read_loop(hub: &ConnectionHub, id: ConnectionId, stream: &mut SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => hub.dispatch(id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection = id, "Ignoring binary frame");
            }
            // Ping/Pong are answered by axum
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(connection = id, error = %e, "WebSocket read error");
                break;
            }
        }
    }
}
