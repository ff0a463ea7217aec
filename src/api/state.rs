//! Application State
//!
//! Shared state accessible by all HTTP and WebSocket handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use chrono::Duration;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{
    BcryptVerifier, CredentialVerifier, SessionManager, DEFAULT_SESSION_MINUTES,
    MAX_SESSION_MINUTES,
};
use crate::store::Store;
use crate::websocket::{BroadcastHub, ConnectionRegistry, MessageRouter};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Persistence for accounts, sessions and board content
    pub store: Arc<dyn Store>,
    /// Open WebSocket connections
    pub registry: Arc<ConnectionRegistry>,
    pub hub: Arc<BroadcastHub>,
    /// Dispatches inbound WebSocket frames
    pub router: Arc<MessageRouter>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire up the board around `store`, hashing passwords with bcrypt
    pub fn new(store: Arc<dyn Store>, config: ApiConfig) -> Self {
        let verifier = Arc::new(BcryptVerifier::new(config.bcrypt_cost));
        Self::with_verifier(store, config, verifier)
    }

    /// Wire up the board with a custom credential verifier
    pub fn with_verifier(
        store: Arc<dyn Store>,
        config: ApiConfig,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&registry)));
        let sessions = Arc::new(SessionManager::new(Arc::clone(&store)));
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&store),
            sessions,
            Arc::clone(&hub),
            verifier,
            config.session_duration(),
        ));

        Self {
            store,
            registry,
            hub,
            router,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub fn ws_connection_count(&self) -> usize {
        self.registry.len()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// HTML file served for every other path
    pub index_file: PathBuf,
    /// Session lifetime in minutes
    pub session_minutes: i64,
    /// bcrypt work factor for new passwords
    pub bcrypt_cost: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: PathBuf::from("static"),
            index_file: PathBuf::from("static/index.html"),
            session_minutes: DEFAULT_SESSION_MINUTES,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session lifetime, held to `1..=MAX_SESSION_MINUTES`
    pub fn session_duration(&self) -> Duration {
        Duration::minutes(self.session_minutes.clamp(1, MAX_SESSION_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_addr() {
        assert_eq!(ApiConfig::new("0.0.0.0", 9000).addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_state_shares_registry_with_hub() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let state = AppState::new(store, ApiConfig::default());

        assert!(Arc::ptr_eq(&state.registry, state.hub.registry()));
        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.config.session_duration(), Duration::minutes(15));
    }

    #[test]
    fn test_session_duration_is_bounded() {
        let config = ApiConfig {
            session_minutes: i64::MAX,
            ..ApiConfig::default()
        };
        assert_eq!(config.session_duration(), Duration::minutes(MAX_SESSION_MINUTES));

        let config = ApiConfig {
            session_minutes: -5,
            ..ApiConfig::default()
        };
        assert_eq!(config.session_duration(), Duration::minutes(1));
    }
}
