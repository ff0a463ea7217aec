//! Credential Verifier
//!
//! Hashes passwords on registration and checks them on login. Hashing is
//! deliberately slow, so the async helpers move the work onto the blocking
//! pool instead of running it on a connection task.

use std::sync::Arc;
use thiserror::Error;

/// Hashes and compares passwords
pub trait CredentialVerifier: Send + Sync {
    /// Produce a salted digest for storage
    fn hash(&self, password: &str) -> Result<String, CredentialError>;

    /// Check `password` against a stored digest
    ///
    /// A malformed digest never verifies.
    fn verify(&self, digest: &str, password: &str) -> bool;
}

/// bcrypt-backed verifier
#[derive(Debug, Clone)]
pub struct BcryptVerifier {
    cost: u32,
}

impl BcryptVerifier {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptVerifier {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialVerifier for BcryptVerifier {
    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        bcrypt::hash(password, self.cost).map_err(|e| CredentialError::Hash(e.to_string()))
    }

    fn verify(&self, digest: &str, password: &str) -> bool {
        match bcrypt::verify(password, digest) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password digest could not be parsed");
                false
            }
        }
    }
}

/// Hash on the blocking pool
pub async fn hash_password(
    verifier: Arc<dyn CredentialVerifier>,
    password: String,
) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || verifier.hash(&password))
        .await
        .map_err(|e| CredentialError::Task(e.to_string()))?
}

/// Verify on the blocking pool
pub async fn verify_password(
    verifier: Arc<dyn CredentialVerifier>,
    digest: String,
    password: String,
) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || verifier.verify(&digest, &password))
        .await
        .map_err(|e| CredentialError::Task(e.to_string()))
}

/// Errors raised while hashing credentials
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Password hashing error: {0}")]
    Hash(String),

    #[error("Hashing task failed: {0}")]
    Task(String),
}
