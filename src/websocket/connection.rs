//! Live connection handle.

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::Reply;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Opaque handle to one client's channel
///
/// Writes go into the connection's outbound queue; a dedicated task drains
/// the queue into the socket. Cloning yields another handle to the same
/// channel.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<String>,
}

impl Connection {
    /// Wrap the outbound queue of a freshly upgraded socket
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), sender)
    }

    pub fn with_id(id: impl Into<ConnectionId>, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue an already-serialized text frame
    pub fn send_text(&self, text: String) -> Result<(), DeliveryError> {
        self.sender.send(text).map_err(|_| DeliveryError::Closed)
    }

    /// Serialize and queue a direct reply
    pub fn send_reply(&self, reply: &Reply) -> Result<(), DeliveryError> {
        let text =
            serde_json::to_string(reply).map_err(|e| DeliveryError::Serialization(e.to_string()))?;
        self.send_text(text)
    }

    /// Whether the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// A write to one connection failed
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Connection closed")]
    Closed,

    #[error("Failed to serialize frame: {0}")]
    Serialization(String),
}
