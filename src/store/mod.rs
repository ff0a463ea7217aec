//! Agora Store
//!
//! Persistence for accounts, sessions and board content.
//!
//! - **types**: Domain records (accounts, posts, comments, messages, sessions)
//! - **sqlite**: SQLite-backed implementation of [`Store`]
//! - **error**: Error types
//!
//! The rest of the crate only sees the [`Store`] trait. Implementations are
//! responsible for their own internal concurrency safety; callers may issue
//! reads and writes from any number of connection tasks at once.

pub mod error;
pub mod sqlite;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;
pub use types::{
    Account, AccountId, Category, Comment, DirectMessage, Identity, NewAccount, NewComment,
    NewDirectMessage, NewPost, OnlineUser, Post, SessionRecord,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Persists and retrieves domain records
#[async_trait]
pub trait Store: Send + Sync {
    // ----- accounts -----

    /// Find an account by username or email, case-insensitively
    async fn find_account(&self, identifier: &str) -> StoreResult<Option<Account>>;

    /// Check whether the email or the username is already taken
    async fn account_exists(&self, email: &str, username: &str) -> StoreResult<bool>;

    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;

    async fn list_usernames(&self) -> StoreResult<Vec<String>>;

    // ----- content -----

    /// Insert a post and link it to its categories as one unit of work
    ///
    /// Fails with [`StoreError::UnknownCategory`] without writing anything
    /// when a category name does not exist.
    async fn insert_post(&self, post: NewPost) -> StoreResult<i64>;

    async fn list_posts(&self) -> StoreResult<Vec<Post>>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Create any of the named categories that do not exist yet
    async fn ensure_categories(&self, names: &[String]) -> StoreResult<()>;

    /// Fails with [`StoreError::PostNotFound`] if the post does not exist
    async fn insert_comment(&self, comment: NewComment) -> StoreResult<i64>;

    async fn list_comments(&self) -> StoreResult<Vec<Comment>>;

    async fn insert_message(&self, message: NewDirectMessage) -> StoreResult<i64>;

    /// All direct messages, oldest first
    async fn list_messages(&self) -> StoreResult<Vec<DirectMessage>>;

    // ----- sessions -----

    /// Users whose session is still active at `now`
    async fn list_online_users(&self, now: DateTime<Utc>) -> StoreResult<Vec<OnlineUser>>;

    /// The session of `account` that is still active at `now`, if any
    async fn active_session(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>>;

    /// The session holding `token`, with the identity it belongs to
    ///
    /// Expiry is not checked here.
    async fn session_by_token(&self, token: &str)
        -> StoreResult<Option<(SessionRecord, Identity)>>;

    /// Insert the session row for `account`
    ///
    /// An account holds at most one row; a leftover row is overwritten.
    async fn insert_session(
        &self,
        account: AccountId,
        token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionRecord>;

    /// Overwrite token and expiry of an existing session row in place
    ///
    /// Returns `false` when the row no longer exists.
    async fn refresh_session(
        &self,
        session_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Delete every session of `account`, returning how many rows went away
    async fn delete_sessions(&self, account: AccountId) -> StoreResult<usize>;

    /// Delete every session whose expiry is at or before `now`
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}
