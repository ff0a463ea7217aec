//! WebSocket Message Types
//!
//! Defines all message types exchanged between board clients and the
//! server.
//!
//! Inbound frames are JSON objects tagged by `action`. Outbound frames are
//! either direct replies (`{type, success, message, data?}`) sent to the
//! requester, or notifications (`{type, data}`) broadcast to everyone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Requests sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundRequest {
    /// Create an account and sign it in
    Register {
        email: String,
        #[serde(rename = "first-name")]
        first_name: String,
        #[serde(rename = "last-name")]
        last_name: String,
        username: String,
        password: String,
        #[serde(deserialize_with = "number_or_numeric_string")]
        age: u32,
        gender: String,
    },
    /// Sign in by username or email
    Login { identifier: String, password: String },
    /// Everything the landing view shows
    HomePage,
    CreatePost {
        #[serde(rename = "createdBy")]
        created_by: String,
        title: String,
        content: String,
        categories: Vec<String>,
    },
    SubmitComment {
        username: String,
        comment: String,
        #[serde(rename = "postID", deserialize_with = "number_or_numeric_string")]
        post_id: i64,
    },
    UserLogout { username: String },
    /// Send a direct message
    NewMessage {
        sender: String,
        receiver: String,
        content: String,
        created_at: DateTime<Utc>,
    },
}

impl InboundRequest {
    /// Every `action` value the router understands
    pub const ACTIONS: &'static [&'static str] = &[
        "register",
        "login",
        "homePage",
        "createPost",
        "submitComment",
        "userLogout",
        "newMessage",
    ];

    /// Decode one text frame
    ///
    /// Separates frames that should be dropped silently (not JSON, no
    /// `action`, unknown `action`) from known actions with bad fields,
    /// which deserve an error reply.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingAction)?
            .to_string();

        if !Self::ACTIONS.contains(&action.as_str()) {
            return Err(DecodeError::UnknownAction(action));
        }

        serde_json::from_value(value).map_err(|e| DecodeError::Invalid {
            action,
            reason: e.to_string(),
        })
    }

    /// The `action` tag this request arrived with
    pub fn action(&self) -> &'static str {
        match self {
            InboundRequest::Register { .. } => "register",
            InboundRequest::Login { .. } => "login",
            InboundRequest::HomePage => "homePage",
            InboundRequest::CreatePost { .. } => "createPost",
            InboundRequest::SubmitComment { .. } => "submitComment",
            InboundRequest::UserLogout { .. } => "userLogout",
            InboundRequest::NewMessage { .. } => "newMessage",
        }
    }
}

/// Why an inbound frame could not become a request
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Malformed(String),

    #[error("Missing action")]
    MissingAction,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A known action with missing or mistyped fields
    #[error("Invalid {action} request: {reason}")]
    Invalid { action: String, reason: String },
}

impl DecodeError {
    /// Whether the frame is dropped without a reply
    pub fn is_silent(&self) -> bool {
        !matches!(self, DecodeError::Invalid { .. })
    }
}

/// Accept `42` as well as `"42"`
fn number_or_numeric_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    let number = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("expected a number, got {:?}", s)))?,
    };

    T::try_from(number).map_err(|_| D::Error::custom(format!("number out of range: {}", number)))
}

/// Discriminator of a direct reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplyKind {
    Registration,
    Login,
    #[serde(rename = "allData")]
    AllData,
    #[serde(rename = "createdPost")]
    CreatedPost,
    #[serde(rename = "newComment")]
    NewComment,
    #[serde(rename = "userLogout")]
    UserLogout,
    #[serde(rename = "newMessageAdd")]
    NewMessageAdd,
    Error,
}

/// Direct reply to the requesting connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Reply {
    pub fn success(kind: ReplyKind, message: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Error,
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Discriminator of a broadcast notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    #[serde(rename = "homePageUpdate")]
    HomePageUpdate,
    #[serde(rename = "updateAllPosts")]
    PostsUpdated,
    #[serde(rename = "updateAllComments")]
    CommentsUpdated,
    /// Wire name is misspelled; deployed clients listen for it as-is
    #[serde(rename = "updatAllUsersOnline")]
    OnlineUsersUpdated,
    #[serde(rename = "updateAllMessages")]
    MessagesUpdated,
}

/// State-change payload broadcast verbatim to all connections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub data: Value,
}

impl Notification {
    pub fn new(kind: NotificationKind, data: Value) -> Self {
        Self { kind, data }
    }
}
