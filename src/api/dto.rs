//! Data Transfer Objects
//!
//! Response types for the HTTP endpoints. Board traffic itself goes over
//! the WebSocket and is defined in `websocket::messages`.

use serde::Serialize;

// ============================================
// HEALTH DTOs
// ============================================

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded
    pub status: String,
    /// Store status
    pub store: String,
    /// Open WebSocket connections
    pub connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
