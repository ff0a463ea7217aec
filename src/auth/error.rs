//! Authentication failures reported back to the client.

use thiserror::Error;

/// A request was refused because of who sent it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("User already exists")]
    UserExists,

    /// Token unknown, revoked or past its expiry
    #[error("Session expired or not found")]
    SessionNotFound,
}
