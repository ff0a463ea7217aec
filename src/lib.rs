//! # Agora
//!
//! A small real-time community board. Clients connect over one WebSocket,
//! register or log in, post, comment and exchange direct messages, and
//! receive live updates whenever any connected client changes shared state.
//!
//! ## Modules
//!
//! - [`websocket`]: Connection registry, broadcast hub and message router
//! - [`auth`]: Session lifecycle, credential hashing, tokens
//! - [`store`]: Persistence behind the [`Store`] trait, SQLite implementation
//! - [`api`]: HTTP server with Axum (WebSocket upgrade, health, static files)
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agora::api::{serve, ApiConfig, AppState};
//! use agora::store::{SqliteStore, Store};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory()?);
//!     store.ensure_categories(&["tech".to_string()]).await?;
//!
//!     let config = ApiConfig::new("127.0.0.1", 8080);
//!     serve(AppState::new(store, config.clone()), &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod store;
pub mod websocket;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use auth::{
    AuthError, BcryptVerifier, CredentialVerifier, Session, SessionError, SessionManager,
    SessionState,
};

pub use store::{SqliteStore, Store, StoreError, StoreResult};

pub use websocket::{
    BroadcastHub, Connection, ConnectionRegistry, HandlerError, InboundRequest, MessageRouter,
    Notification, NotificationKind, Reply, ReplyKind, websocket_handler,
};

pub use config::{Config, ConfigError, LoggingConfig};
