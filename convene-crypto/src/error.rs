//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in key derivation and envelope operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Password or salt was empty/malformed. A local precondition failure,
    /// surfaced to callers as a client error.
    #[error("password and salt must be non-empty")]
    InvalidCredentialsInput,

    /// Password verification failed at login.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Wrong key/IV or corrupted ciphertext. Deliberately carries no
    /// detail: callers must not be able to distinguish the causes.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid key length: expected {expected}, actual {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid IV length: expected {expected}, actual {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}
