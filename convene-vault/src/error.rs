//! Vault error types.

use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur in session, grant and store-lifecycle operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The principal has no secret in the session cache — they must
    /// re-authenticate before this operation can proceed.
    #[error("no session secret for principal {0}; re-authentication required")]
    SecretUnavailable(String),

    /// The principal was never granted a wrapped key for this meeting.
    /// An authorization failure, distinct from any decryption problem.
    #[error("principal {principal_id} has no grant for meeting {meeting_id}")]
    NoGrantForPrincipal {
        meeting_id: String,
        principal_id: String,
    },

    /// The meeting's store is neither open nor discoverable.
    #[error("meeting store unavailable: {0}")]
    MeetingStoreUnavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] convene_storage::StorageError),

    #[error("crypto error: {0}")]
    Crypto(#[from] convene_crypto::CryptoError),

    #[error("catalog error: {0}")]
    Catalog(String),
}
