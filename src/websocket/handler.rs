//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::connection::Connection;
use super::registry::ConnectionRegistry;
use super::router::MessageRouter;
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for board clients.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let registry = Arc::clone(&state.registry);
    let router = Arc::clone(&state.router);
    ws.on_upgrade(move |socket| handle_socket(socket, registry, router))
}

/// Handle an established WebSocket connection
///
/// One task reads frames and dispatches them in order; another drains the
/// outbound queue into the socket. Whichever finishes first ends the other.
async fn handle_socket(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Outbound queue for this connection; replies and broadcasts both land here
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection = Connection::new(tx);

    // Dropped on every exit path below, which unregisters the connection
    let guard = registry.guard(connection.clone());
    let connection_id = guard.id().to_string();

    let conn_id_for_send = connection_id.clone();

    // Task to forward queued frames to the WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    // Task to receive frames from the WebSocket and route them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&router, &connection, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    drop(guard);
    tracing::debug!(connection_id = %connection_id, "Connection task finished");
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(
    router: &MessageRouter,
    connection: &Connection,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            router.dispatch(connection, &text).await;
            true
        }
        Message::Binary(_) => {
            tracing::debug!(connection_id = %connection.id(), "Ignoring binary frame");
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings itself
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection.id(), "Client requested close");
            false
        }
    }
}
