//! Aggregate payloads carried in `data` of replies and notifications.
//!
//! Clients replace their local copy wholesale with whatever arrives, so
//! every view is a full re-read rather than a delta.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{Category, Comment, DirectMessage, OnlineUser, Post};

/// Everything the landing page renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePageView {
    pub all_usernames: Vec<String>,
    pub all_posts: Vec<Post>,
    pub all_categories: Vec<Category>,
    pub all_comments: Vec<Comment>,
    #[serde(rename = "usersOnline")]
    pub users_online: Vec<OnlineUser>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsView {
    pub all_posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsView {
    pub all_comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersView {
    pub users_online: Vec<OnlineUser>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesView {
    pub all_messages: Vec<DirectMessage>,
}

/// Sent to a client that just registered or logged in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthView {
    pub logged_in_username: String,
    pub is_authenticated: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub all_messages: Vec<DirectMessage>,
}
