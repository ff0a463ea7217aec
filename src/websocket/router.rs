//! Message Router
//!
//! Turns one inbound text frame into at most one direct reply and at most
//! one broadcast. Each handler validates first, performs a single store
//! mutation, re-reads the aggregate view it affects, and returns both the
//! reply and the notification carrying that view.
//!
//! Frames from one connection are dispatched in arrival order by that
//! connection's reader task; the router itself holds no per-connection
//! state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::connection::Connection;
use super::error::{HandlerError, HandlerResult};
use super::hub::BroadcastHub;
use super::messages::{
    DecodeError, InboundRequest, Notification, NotificationKind, Reply, ReplyKind,
};
use super::views::{
    AuthView, CommentsView, HomePageView, MessagesView, OnlineUsersView, PostsView,
};
use crate::auth::{
    hash_password, verify_password, AuthError, CredentialVerifier, Session, SessionManager,
};
use crate::store::{Account, NewAccount, NewComment, NewDirectMessage, NewPost, Store};

/// What handling one frame produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outcome {
    /// Sent to the requesting connection only
    pub reply: Option<Reply>,
    /// Sent to every registered connection after the reply
    pub notification: Option<Notification>,
}

impl Outcome {
    fn dropped() -> Self {
        Self::default()
    }

    fn reply(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            notification: None,
        }
    }

    fn with_broadcast(reply: Reply, notification: Notification) -> Self {
        Self {
            reply: Some(reply),
            notification: Some(notification),
        }
    }
}

/// Routes requests to handlers and delivers their results
pub struct MessageRouter {
    store: Arc<dyn Store>,
    sessions: Arc<SessionManager>,
    hub: Arc<BroadcastHub>,
    verifier: Arc<dyn CredentialVerifier>,
    session_duration: Duration,
}

impl MessageRouter {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<SessionManager>,
        hub: Arc<BroadcastHub>,
        verifier: Arc<dyn CredentialVerifier>,
        session_duration: Duration,
    ) -> Self {
        Self {
            store,
            sessions,
            hub,
            verifier,
            session_duration,
        }
    }

    /// Handle one frame from `connection` and deliver the result
    ///
    /// The reply is queued on the requester before the notification is
    /// published, so the requester sees its own reply first.
    pub async fn dispatch(&self, connection: &Connection, text: &str) -> Outcome {
        let outcome = self.route(connection.id(), text).await;

        if let Some(reply) = &outcome.reply {
            if let Err(e) = connection.send_reply(reply) {
                tracing::debug!(
                    connection_id = %connection.id(),
                    error = %e,
                    "Failed to queue reply"
                );
            }
        }

        if let Some(notification) = &outcome.notification {
            self.hub.publish(notification);
        }

        outcome
    }

    /// Decode and handle one frame without delivering anything
    pub async fn route(&self, connection_id: &str, text: &str) -> Outcome {
        let request = match InboundRequest::decode(text) {
            Ok(request) => request,
            Err(DecodeError::Invalid { action, reason }) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    action = %action,
                    reason = %reason,
                    "Rejecting request"
                );
                return Outcome::reply(Reply::error(format!(
                    "Invalid message format: {}",
                    reason
                )));
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Dropping frame");
                return Outcome::dropped();
            }
        };

        let action = request.action();
        tracing::debug!(connection_id = %connection_id, action, "Handling request");

        match self.handle(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_internal() {
                    tracing::error!(
                        connection_id = %connection_id,
                        action,
                        error = %e,
                        "Request failed"
                    );
                } else {
                    tracing::debug!(
                        connection_id = %connection_id,
                        action,
                        error = %e,
                        "Request refused"
                    );
                }
                Outcome::reply(Reply::error(e.reply_message()))
            }
        }
    }

    async fn handle(&self, request: InboundRequest) -> HandlerResult<Outcome> {
        match request {
            InboundRequest::Register {
                email,
                first_name,
                last_name,
                username,
                password,
                age,
                gender,
            } => {
                self.register(RegisterForm {
                    email,
                    first_name,
                    last_name,
                    username,
                    password,
                    age,
                    gender,
                })
                .await
            }
            InboundRequest::Login {
                identifier,
                password,
            } => self.login(identifier, password).await,
            InboundRequest::HomePage => self.home_page().await,
            InboundRequest::CreatePost {
                created_by,
                title,
                content,
                categories,
            } => self.create_post(created_by, title, content, categories).await,
            InboundRequest::SubmitComment {
                username,
                comment,
                post_id,
            } => self.submit_comment(username, comment, post_id).await,
            InboundRequest::UserLogout { username } => self.user_logout(username).await,
            InboundRequest::NewMessage {
                sender,
                receiver,
                content,
                created_at,
            } => self.new_message(sender, receiver, content, created_at).await,
        }
    }

    // ----- handlers -----

    async fn register(&self, form: RegisterForm) -> HandlerResult<Outcome> {
        let form = form.validate()?;

        if self.store.account_exists(&form.email, &form.username).await? {
            return Err(AuthError::UserExists.into());
        }

        let password_hash = hash_password(Arc::clone(&self.verifier), form.password).await?;

        let account = self
            .store
            .insert_account(NewAccount {
                email: form.email,
                first_name: form.first_name,
                last_name: form.last_name,
                username: form.username,
                password_hash,
                age: form.age,
                gender: form.gender,
                created_at: self.sessions.now(),
            })
            .await?;
        tracing::info!(username = %account.username, "Account registered");

        let view = self.sign_in(&account).await?;
        Ok(Outcome::reply(Reply::success(
            ReplyKind::Registration,
            "Registration successful",
            to_data(&view)?,
        )))
    }

    async fn login(&self, identifier: String, password: String) -> HandlerResult<Outcome> {
        let identifier = required(identifier, "identifier")?;
        if password.is_empty() {
            return Err(HandlerError::invalid_field("password"));
        }

        let account = self
            .store
            .find_account(&identifier)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let matches = verify_password(
            Arc::clone(&self.verifier),
            account.password_hash.clone(),
            password,
        )
        .await?;
        if !matches {
            return Err(AuthError::InvalidPassword.into());
        }

        let view = self.sign_in(&account).await?;
        tracing::info!(username = %account.username, "User logged in");
        Ok(Outcome::reply(Reply::success(
            ReplyKind::Login,
            "Login successful",
            to_data(&view)?,
        )))
    }

    async fn home_page(&self) -> HandlerResult<Outcome> {
        let view = HomePageView {
            all_usernames: self.store.list_usernames().await?,
            all_posts: self.store.list_posts().await?,
            all_categories: self.store.list_categories().await?,
            all_comments: self.store.list_comments().await?,
            users_online: self.store.list_online_users(self.sessions.now()).await?,
        };
        let data = to_data(&view)?;

        Ok(Outcome::with_broadcast(
            Reply::success(ReplyKind::AllData, "Home Page Data", data.clone()),
            Notification::new(NotificationKind::HomePageUpdate, data),
        ))
    }

    async fn create_post(
        &self,
        created_by: String,
        title: String,
        content: String,
        categories: Vec<String>,
    ) -> HandlerResult<Outcome> {
        let created_by = required(created_by, "createdBy")?;
        let title = required(title, "title")?;
        let content = required(content, "content")?;
        let categories = normalize_categories(categories)?;

        let author = self.account(&created_by).await?;
        let post_id = self
            .store
            .insert_post(NewPost {
                author: author.id,
                title,
                content,
                categories,
                created_at: self.sessions.now(),
            })
            .await?;
        tracing::info!(post_id, username = %author.username, "Post created");

        let view = PostsView {
            all_posts: self.store.list_posts().await?,
        };
        let data = to_data(&view)?;

        Ok(Outcome::with_broadcast(
            Reply::success(ReplyKind::CreatedPost, "Update Posts Data", data.clone()),
            Notification::new(NotificationKind::PostsUpdated, data),
        ))
    }

    async fn submit_comment(
        &self,
        username: String,
        comment: String,
        post_id: i64,
    ) -> HandlerResult<Outcome> {
        let username = required(username, "username")?;
        let comment = required(comment, "comment")?;
        if post_id <= 0 {
            return Err(HandlerError::invalid_field("postID"));
        }

        let author = self.account(&username).await?;
        let comment_id = self
            .store
            .insert_comment(NewComment {
                post_id,
                author: author.id,
                content: comment,
                created_at: self.sessions.now(),
            })
            .await?;
        tracing::info!(comment_id, post_id, username = %author.username, "Comment added");

        let view = CommentsView {
            all_comments: self.store.list_comments().await?,
        };
        let data = to_data(&view)?;

        Ok(Outcome::with_broadcast(
            Reply::success(ReplyKind::NewComment, "Update Comments Data", data.clone()),
            Notification::new(NotificationKind::CommentsUpdated, data),
        ))
    }

    async fn user_logout(&self, username: String) -> HandlerResult<Outcome> {
        let username = required(username, "username")?;
        let account = self.account(&username).await?;

        let revoked = self.sessions.revoke(&account.identity()).await?;
        tracing::info!(username = %account.username, revoked, "User logged out");

        let view = OnlineUsersView {
            users_online: self.store.list_online_users(self.sessions.now()).await?,
        };
        let data = to_data(&view)?;

        Ok(Outcome::with_broadcast(
            Reply::success(ReplyKind::UserLogout, "User logout successful", data.clone()),
            Notification::new(NotificationKind::OnlineUsersUpdated, data),
        ))
    }

    async fn new_message(
        &self,
        sender: String,
        receiver: String,
        content: String,
        created_at: DateTime<Utc>,
    ) -> HandlerResult<Outcome> {
        let sender = required(sender, "sender")?;
        let receiver = required(receiver, "receiver")?;
        if content.trim().is_empty() {
            return Err(HandlerError::invalid_field("content"));
        }

        let message_id = self
            .store
            .insert_message(NewDirectMessage {
                sender,
                receiver,
                content,
                created_at,
            })
            .await?;
        tracing::debug!(message_id, "Direct message stored");

        let view = MessagesView {
            all_messages: self.store.list_messages().await?,
        };
        let data = to_data(&view)?;

        Ok(Outcome::with_broadcast(
            Reply::success(ReplyKind::NewMessageAdd, "Message sent successfully", data.clone()),
            Notification::new(NotificationKind::MessagesUpdated, data),
        ))
    }

    // ----- helpers -----

    async fn account(&self, identifier: &str) -> HandlerResult<Account> {
        self.store
            .find_account(identifier)
            .await?
            .ok_or_else(|| AuthError::UserNotFound.into())
    }

    /// Create or refresh the session and build the signed-in view
    async fn sign_in(&self, account: &Account) -> HandlerResult<AuthView> {
        let Session {
            token, expires_at, ..
        } = self
            .sessions
            .create_or_refresh(&account.identity(), self.session_duration)
            .await?;

        // Name as stored for this token
        let identity = self.sessions.identity_for_token(&token).await?;

        Ok(AuthView {
            logged_in_username: identity.username,
            is_authenticated: true,
            token,
            expires_at,
            all_messages: self.store.list_messages().await?,
        })
    }
}

/// Registration fields after decoding, before validation
struct RegisterForm {
    email: String,
    first_name: String,
    last_name: String,
    username: String,
    password: String,
    age: u32,
    gender: String,
}

impl RegisterForm {
    /// Check every field and normalize email and username to lowercase
    fn validate(self) -> HandlerResult<Self> {
        let email = required(self.email, "email")?.to_lowercase();
        if !is_plausible_email(&email) {
            return Err(HandlerError::invalid_field("email"));
        }

        let username = required(self.username, "username")?.to_lowercase();
        if username.chars().any(char::is_whitespace) {
            return Err(HandlerError::invalid_field("username"));
        }

        if self.password.is_empty() {
            return Err(HandlerError::invalid_field("password"));
        }
        if self.age == 0 {
            return Err(HandlerError::invalid_field("age"));
        }

        Ok(Self {
            email,
            first_name: required(self.first_name, "first name")?,
            last_name: required(self.last_name, "last name")?,
            username,
            password: self.password,
            age: self.age,
            gender: required(self.gender, "gender")?,
        })
    }
}

/// Trimmed value, or a validation error naming `field` if it is blank
fn required(value: String, field: &str) -> HandlerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HandlerError::invalid_field(field));
    }
    Ok(trimmed.to_string())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// Trim, reject blanks, drop duplicates while keeping order
fn normalize_categories(categories: Vec<String>) -> HandlerResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        let category = required(category, "category")?;
        if !normalized.contains(&category) {
            normalized.push(category);
        }
    }
    Ok(normalized)
}

fn to_data<T: Serialize>(view: &T) -> HandlerResult<Value> {
    Ok(serde_json::to_value(view)?)
}
