//! Connection Registry
//!
//! The set of currently open connections. This is the only state shared
//! between connection tasks at the transport layer; every operation takes
//! the one lock, so registration, removal and iteration never see a
//! half-updated set.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::connection::{Connection, ConnectionId};

/// Tracks which live channels are currently open
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the live set
    ///
    /// Registering the same connection twice keeps one entry. Returns
    /// whether the connection was newly added.
    pub fn register(&self, connection: Connection) -> bool {
        let id = connection.id().to_string();
        let added = self.write().insert(id.clone(), connection).is_none();
        if added {
            tracing::info!(connection_id = %id, "WebSocket connected");
        }
        added
    }

    /// Remove a connection; no-op if it is not registered
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::info!(connection_id = %id, "WebSocket disconnected");
        }
        removed
    }

    /// Register `connection` and unregister it again when the guard drops
    ///
    /// Hold the guard for the lifetime of the connection task so removal
    /// happens on every exit path, including errors and cancellation.
    pub fn guard(self: &Arc<Self>, connection: Connection) -> RegistrationGuard {
        let id = connection.id().to_string();
        self.register(connection);
        RegistrationGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Apply `visit` to a point-in-time snapshot of the live set
    ///
    /// The lock is released before `visit` runs, so visitors may register
    /// or unregister without deadlocking.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Connection),
    {
        let snapshot: Vec<Connection> = self.read().values().cloned().collect();
        for connection in &snapshot {
            visit(connection);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-written
    // (every critical section is a single map call), so a poisoned lock is
    // still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps a connection registered until dropped
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl RegistrationGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}
