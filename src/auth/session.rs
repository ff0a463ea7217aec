//! Session Manager
//!
//! Owns the session lifecycle on top of the store. Per identity a session
//! moves through:
//!
//! ```text
//! NoSession --login/register--> Active --re-login--> Active (new token, new expiry)
//!                                  |
//!                       expiry passes / logout
//!                                  v
//!                          Expired | Revoked --> NoSession
//! ```
//!
//! Expired rows are reaped lazily: before every create/refresh, and on a
//! token lookup that finds one.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::token::generate_token;
use crate::store::{Identity, SessionRecord, Store, StoreError};

/// Default session lifetime
pub const DEFAULT_SESSION_MINUTES: i64 = 15;

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_MINUTES: i64 = 525_600;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A time-bounded proof of authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Row id of the stored session
    pub(crate) id: i64,
    pub identity: Identity,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn from_record(record: SessionRecord, identity: Identity) -> Self {
        Self {
            id: record.session_id,
            identity,
            token: record.token,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }

    /// Whether the session still authenticates at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Where an identity currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active(Session),
    Expired(Session),
}

impl SessionState {
    /// Classify a stored session (or its absence) at `now`
    pub fn of(session: Option<Session>, now: DateTime<Utc>) -> Self {
        match session {
            None => SessionState::NoSession,
            Some(session) if session.is_active_at(now) => SessionState::Active(session),
            Some(session) => SessionState::Expired(session),
        }
    }
}

/// Manages sessions for all identities
pub struct SessionManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    /// Serializes create/refresh and revoke so a lookup-then-write is never
    /// interleaved with another session write
    write_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Current time as seen by this manager
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a session for `identity`, or refresh the one it already holds
    ///
    /// Refreshing overwrites token and expiry in place; the identity never
    /// ends up with two rows.
    pub async fn create_or_refresh(
        &self,
        identity: &Identity,
        duration: Duration,
    ) -> Result<Session, SessionError> {
        let _guard = self.write_lock.lock().await;

        let now = self.clock.now();
        self.purge_expired_at(now).await?;

        let expires_at = now
            .checked_add_signed(duration)
            .ok_or(SessionError::DurationOutOfRange(duration))?;
        let token = generate_token();

        let current = self
            .store
            .active_session(identity.account_id, now)
            .await?
            .map(|record| Session::from_record(record, identity.clone()));

        if let SessionState::Active(existing) = SessionState::of(current, now) {
            if self
                .store
                .refresh_session(existing.id, &token, expires_at)
                .await?
            {
                tracing::debug!(username = %identity.username, "Session refreshed");
                return Ok(Session {
                    token,
                    expires_at,
                    ..existing
                });
            }
            tracing::debug!(username = %identity.username, "Session row vanished before refresh");
        }

        let record = self
            .store
            .insert_session(identity.account_id, &token, now, expires_at)
            .await?;
        tracing::debug!(username = %identity.username, "Session created");
        Ok(Session::from_record(record, identity.clone()))
    }

    /// Resolve a token to the identity it authenticates
    ///
    /// Fails with [`SessionError::NotFound`] for unknown tokens and for
    /// sessions whose expiry has passed. An expired row found here is
    /// deleted along with every other expired row.
    pub async fn identity_for_token(&self, token: &str) -> Result<Identity, SessionError> {
        let now = self.clock.now();
        let stored = self
            .store
            .session_by_token(token)
            .await?
            .map(|(record, identity)| Session::from_record(record, identity));

        match SessionState::of(stored, now) {
            SessionState::Active(session) => Ok(session.identity),
            SessionState::Expired(_) => {
                self.purge_expired_at(now).await?;
                Err(SessionError::NotFound)
            }
            SessionState::NoSession => Err(SessionError::NotFound),
        }
    }

    /// Delete every session of `identity` (logout)
    pub async fn revoke(&self, identity: &Identity) -> Result<usize, SessionError> {
        let _guard = self.write_lock.lock().await;
        let deleted = self.store.delete_sessions(identity.account_id).await?;
        tracing::debug!(username = %identity.username, deleted, "Sessions revoked");
        Ok(deleted)
    }

    /// Delete every session whose expiry has passed
    pub async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = self.clock.now();
        self.purge_expired_at(now).await
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let purged = self.store.purge_expired_sessions(now).await?;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired sessions");
        }
        Ok(purged)
    }
}

/// Errors raised by the session manager
#[derive(Debug, Error)]
pub enum SessionError {
    /// No active session holds the token
    #[error("Session not found")]
    NotFound,

    /// Adding the lifetime to the current time overflows
    #[error("Session duration out of range: {0}")]
    DurationOutOfRange(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewAccount, SqliteStore};
    use std::sync::Mutex as StdMutex;

    /// Clock that only moves when told to
    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Self {
            Self(StdMutex::new(Utc::now()))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    async fn setup() -> (Arc<SessionManager>, Arc<ManualClock>, Arc<dyn Store>, Identity) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let account = store
            .insert_account(NewAccount {
                email: "alice@example.com".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Liddell".to_string(),
                username: "alice".to_string(),
                password_hash: "digest".to_string(),
                age: 30,
                gender: "female".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new());
        let manager = Arc::new(SessionManager::with_clock(
            Arc::clone(&store),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        (manager, clock, store, account.identity())
    }

    fn fifteen_minutes() -> Duration {
        Duration::minutes(DEFAULT_SESSION_MINUTES)
    }

    #[test]
    fn test_state_classification() {
        let now = Utc::now();
        let session = Session {
            id: 1,
            identity: Identity {
                account_id: 1,
                username: "alice".to_string(),
            },
            token: "t".to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(1),
        };

        assert_eq!(SessionState::of(None, now), SessionState::NoSession);
        assert!(matches!(
            SessionState::of(Some(session.clone()), now),
            SessionState::Active(_)
        ));
        // Expiry is exclusive: a session is dead at its expires_at instant
        assert!(matches!(
            SessionState::of(Some(session.clone()), session.expires_at),
            SessionState::Expired(_)
        ));
    }

    #[tokio::test]
    async fn test_second_login_refreshes_in_place() {
        let (manager, clock, store, alice) = setup().await;

        let first = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        clock.advance(Duration::minutes(5));
        let second = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_ne!(first.token, second.token);
        assert!(second.expires_at > first.expires_at);

        let online = store.list_online_users(manager.now()).await.unwrap();
        assert_eq!(online.len(), 1);

        // The replaced token no longer authenticates
        assert!(matches!(
            manager.identity_for_token(&first.token).await,
            Err(SessionError::NotFound)
        ));
        assert_eq!(manager.identity_for_token(&second.token).await.unwrap(), alice);
    }

    #[tokio::test]
    async fn test_expired_lookup_reaps_row() {
        let (manager, clock, store, alice) = setup().await;

        let session = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        clock.advance(Duration::minutes(16));

        assert!(matches!(
            manager.identity_for_token(&session.token).await,
            Err(SessionError::NotFound)
        ));
        // The lookup reaped the row
        assert!(store.session_by_token(&session.token).await.unwrap().is_none());
        assert_eq!(manager.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_after_expiry_replaces_stale_row() {
        let (manager, clock, store, alice) = setup().await;

        let old = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        clock.advance(Duration::minutes(20));
        let new = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();

        assert_ne!(old.token, new.token);
        assert!(store.session_by_token(&old.token).await.unwrap().is_none());
        assert_eq!(
            new.created_at.timestamp_millis(),
            manager.now().timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_purge_expired_counts_rows() {
        let (manager, clock, _store, alice) = setup().await;

        manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        assert_eq!(manager.purge_expired().await.unwrap(), 0);

        clock.advance(Duration::minutes(15));
        assert_eq!(manager.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oversized_duration_is_an_error() {
        let (manager, _clock, store, alice) = setup().await;

        let result = manager
            .create_or_refresh(&alice, Duration::days(365 * 500_000))
            .await;
        assert!(matches!(result, Err(SessionError::DurationOutOfRange(_))));
        assert!(store.list_online_users(manager.now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_of_vanished_row_inserts_new_session() {
        let (manager, _clock, store, alice) = setup().await;

        let first = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        let record = store
            .active_session(alice.account_id, manager.now())
            .await
            .unwrap()
            .unwrap();
        store.delete_sessions(alice.account_id).await.unwrap();
        assert!(!store
            .refresh_session(record.session_id, "other", first.expires_at)
            .await
            .unwrap());

        let second = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        assert_eq!(manager.identity_for_token(&second.token).await.unwrap(), alice);
    }

    #[tokio::test]
    async fn test_revoke_and_login_interleave_cleanly() {
        let (manager, _clock, _store, alice) = setup().await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let alice = alice.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        manager
                            .create_or_refresh(&alice, fifteen_minutes())
                            .await
                            .unwrap();
                    } else {
                        manager.revoke(&alice).await.unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let session = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        assert_eq!(manager.identity_for_token(&session.token).await.unwrap(), alice);
    }

    #[tokio::test]
    async fn test_revoke_without_session_is_ok() {
        let (manager, _clock, _store, alice) = setup().await;
        assert_eq!(manager.revoke(&alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_ends_session() {
        let (manager, _clock, _store, alice) = setup().await;

        let session = manager.create_or_refresh(&alice, fifteen_minutes()).await.unwrap();
        assert_eq!(manager.revoke(&alice).await.unwrap(), 1);

        assert!(matches!(
            manager.identity_for_token(&session.token).await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_logins_leave_one_session() {
        let (manager, _clock, store, alice) = setup().await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let alice = alice.clone();
                tokio::spawn(async move {
                    manager
                        .create_or_refresh(&alice, fifteen_minutes())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let online = store.list_online_users(manager.now()).await.unwrap();
        assert_eq!(online.len(), 1);
    }
}
