//! WebSocket Board Channel
//!
//! The single bidirectional channel every board client talks over.
//!
//! ## Architecture
//!
//! - **ConnectionRegistry**: The set of open connections
//! - **BroadcastHub**: Fans state-change notifications out to every connection
//! - **MessageRouter**: Decodes requests and runs the matching handler
//! - **Handler**: Handles WebSocket upgrade and the per-connection tasks
//! - **Messages**: Inbound requests, direct replies and notifications
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8080/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({action: 'login', identifier: 'alice', password: 'p1'}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(msg.type, msg.data);
//! };
//! ```

mod connection;
mod error;
mod handler;
mod hub;
mod messages;
mod registry;
mod router;
mod views;

pub use connection::{Connection, ConnectionId, DeliveryError};
pub use error::{HandlerError, HandlerResult};
pub use handler::websocket_handler;
pub use hub::{BroadcastHub, DeliveryReport};
pub use messages::{
    DecodeError, InboundRequest, Notification, NotificationKind, Reply, ReplyKind,
};
pub use registry::{ConnectionRegistry, RegistrationGuard};
pub use router::{MessageRouter, Outcome};
pub use views::{AuthView, CommentsView, HomePageView, MessagesView, OnlineUsersView, PostsView};
