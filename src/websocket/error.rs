//! Request Handling Errors
//!
//! Every failure a request handler can hit, and the text the client sees
//! for it. Persistence details are logged, never sent.

use thiserror::Error;

use crate::auth::{AuthError, CredentialError, SessionError};
use crate::store::StoreError;

/// Why a request produced an `Error` reply
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Malformed or missing field; nothing was written
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A view could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Server-side fault with no more specific kind
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// `"Invalid {field} format"`
    pub fn invalid_field(field: &str) -> Self {
        HandlerError::Validation(format!("Invalid {} format", field))
    }

    /// Whether the failure is on the server side rather than the request
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            HandlerError::Store(_)
                | HandlerError::Credential(_)
                | HandlerError::Serialization(_)
                | HandlerError::Internal(_)
        )
    }

    /// Text placed in the `message` of the `Error` reply
    pub fn reply_message(&self) -> String {
        match self {
            HandlerError::Validation(reason) => reason.clone(),
            HandlerError::Auth(e) => e.to_string(),
            HandlerError::Store(_) => "Database error".to_string(),
            HandlerError::Credential(_) => "Password hashing error".to_string(),
            HandlerError::Serialization(_) | HandlerError::Internal(_) => {
                "Internal error".to_string()
            }
        }
    }
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownCategory(name) => {
                HandlerError::Validation(format!("Unknown category: {}", name))
            }
            StoreError::PostNotFound(id) => {
                HandlerError::Validation(format!("Post not found: {}", id))
            }
            StoreError::AccountExists => HandlerError::Auth(AuthError::UserExists),
            other => HandlerError::Store(other),
        }
    }
}

impl From<SessionError> for HandlerError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => HandlerError::Auth(AuthError::SessionNotFound),
            SessionError::Store(store) => store.into(),
            e @ SessionError::DurationOutOfRange(_) => HandlerError::Internal(e.to_string()),
        }
    }
}

/// Result type for request handlers
pub type HandlerResult<T> = Result<T, HandlerError>;
