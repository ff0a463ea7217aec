//! Authentication
//!
//! - **session**: Session lifecycle (create/refresh, lookup, revoke, purge)
//! - **credentials**: Password hashing and verification
//! - **token**: Unguessable session tokens
//! - **error**: Authentication failures

pub mod credentials;
pub mod error;
pub mod session;
pub mod token;

pub use credentials::{
    hash_password, verify_password, BcryptVerifier, CredentialError, CredentialVerifier,
};
pub use error::AuthError;
pub use session::{
    Clock, Session, SessionError, SessionManager, SessionState, SystemClock,
    DEFAULT_SESSION_MINUTES, MAX_SESSION_MINUTES,
};
pub use token::generate_token;
