//! Domain records persisted by the store
//!
//! Read-side records serialize with the field names the board's browser
//! client already consumes, so they can be embedded directly in replies
//! and notifications.
//!
//! - `Account` / `NewAccount`: registered users
//! - `Post`, `Comment`, `DirectMessage`, `Category`: board content
//! - `OnlineUser`: users holding an active session
//! - `SessionRecord`: one persisted session row

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Primary key of a registered account
pub type AccountId = i64;

/// A registered account, addressed by username or email
///
/// Carries the stored password digest, so it is never serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl Account {
    /// The identity this account authenticates as
    pub fn identity(&self) -> Identity {
        Identity {
            account_id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Who a session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    pub account_id: AccountId,
    pub username: String,
}

/// Account to be inserted on registration
///
/// `email` and `username` are expected lowercased by the caller.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password_hash: String,
    pub age: u32,
    pub gender: String,
    pub created_at: DateTime<Utc>,
}

/// A post category tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub category_id: i64,
    pub category: String,
}

/// A post together with its category tags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub post_id: i64,
    pub username: String,
    pub title: String,
    pub content: String,
    pub categories: Vec<String>,
    /// Space-joined category names, for clients that render a single label
    pub post_category: String,
    pub created_at: DateTime<Utc>,
}

/// Post to be inserted, with the names of the categories it links to
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: AccountId,
    pub title: String,
    pub content: String,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub comment_id: i64,
    pub username: String,
    pub content: String,
    #[serde(rename = "post_comment_id")]
    pub post_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author: AccountId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A private message between two users
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectMessage {
    #[serde(rename = "message_ID")]
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDirectMessage {
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A user with an active session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnlineUser {
    #[serde(rename = "userID")]
    pub user_id: AccountId,
    pub username: String,
}

/// One persisted session row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: i64,
    pub account_id: AccountId,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Convert stored unix milliseconds back into a timestamp
pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
