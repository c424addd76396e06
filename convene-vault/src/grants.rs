//! Meeting key grants — one wrapped data-key copy per authorized principal.
//!
//! The wrapped copies live inside the meeting's own store, next to the
//! data they protect, so a meeting can be exported or deleted as a single
//! unit. The wrapping key for every grant is the principal's long-term
//! secret, fetched from the session cache.

use crate::error::{VaultError, VaultResult};
use crate::session::SessionKeyCache;
use convene_crypto::{open, seal, CryptoError, MeetingDataKey, KEY_SIZE};
use convene_storage::MeetingStore;
use convene_types::PrincipalId;
use tracing::debug;

/// Wraps and unwraps meeting data keys against the session cache.
#[derive(Clone)]
pub struct MeetingKeyRegistry {
    cache: SessionKeyCache,
}

impl MeetingKeyRegistry {
    pub fn new(cache: SessionKeyCache) -> Self {
        Self { cache }
    }

    /// Wraps `data_key` under the principal's cached secret and stores the
    /// copy in the meeting's store.
    ///
    /// Fails with [`VaultError::SecretUnavailable`] if the principal has
    /// not logged in this cache epoch. Re-granting replaces the existing
    /// row, preserving the one-row-per-principal invariant.
    pub async fn grant(
        &self,
        store: &MeetingStore,
        principal_id: &str,
        principal_email: &str,
        data_key: &MeetingDataKey,
    ) -> VaultResult<()> {
        let secret = self
            .cache
            .get(principal_id)
            .await
            .ok_or_else(|| VaultError::SecretUnavailable(principal_id.to_string()))?;

        let envelope = seal(secret.as_bytes(), data_key.as_bytes())?;
        store.upsert_wrapped_key(principal_id, principal_email, &envelope)?;
        debug!(
            meeting_id = store.meeting_id(),
            principal_id, "granted meeting key"
        );
        Ok(())
    }

    /// Unwraps the meeting data key using the principal's cached secret.
    ///
    /// Fails with [`VaultError::NoGrantForPrincipal`] when no wrapped copy
    /// exists for the principal (an authorization failure), and
    /// [`VaultError::SecretUnavailable`] when they are not logged in.
    pub async fn unwrap_data_key(
        &self,
        store: &MeetingStore,
        principal_id: &str,
    ) -> VaultResult<MeetingDataKey> {
        let row = store.wrapped_key_for(principal_id)?.ok_or_else(|| {
            VaultError::NoGrantForPrincipal {
                meeting_id: store.meeting_id().to_string(),
                principal_id: principal_id.to_string(),
            }
        })?;

        let secret = self
            .cache
            .get(principal_id)
            .await
            .ok_or_else(|| VaultError::SecretUnavailable(principal_id.to_string()))?;

        let plaintext = open(secret.as_bytes(), &row.envelope())?;
        if plaintext.len() != KEY_SIZE {
            return Err(CryptoError::DecryptionFailed.into());
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&plaintext);
        Ok(MeetingDataKey::from_bytes(bytes))
    }

    /// Removes a principal's wrapped copy. Returns whether one existed.
    pub async fn revoke(&self, store: &MeetingStore, principal_id: &str) -> VaultResult<bool> {
        let removed = store.remove_wrapped_key(principal_id)?;
        if removed {
            debug!(
                meeting_id = store.meeting_id(),
                principal_id, "revoked meeting key"
            );
        }
        Ok(removed)
    }

    /// Filters `candidates` down to the principals currently present in
    /// the session cache.
    ///
    /// An availability check only — no unwrap is attempted and presence
    /// implies nothing about authorization for any particular meeting.
    pub async fn list_unlocked_principals(
        &self,
        candidates: &[PrincipalId],
    ) -> Vec<PrincipalId> {
        let mut unlocked = Vec::new();
        for candidate in candidates {
            if self.cache.contains(candidate).await {
                unlocked.push(candidate.clone());
            }
        }
        unlocked
    }
}
