//! Shared model types for Convene.
//!
//! Identifiers are opaque strings (UUID v4 on creation). Timestamps are
//! epoch milliseconds (`i64`) everywhere they are persisted.

use serde::{Deserialize, Serialize};

/// Opaque principal (account) identifier.
pub type PrincipalId = String;

/// Opaque meeting identifier. One meeting owns exactly one isolated store.
pub type MeetingId = String;

/// Generates a fresh opaque id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Role of a principal within the deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

/// An account able to unlock meeting stores.
///
/// `wrapped_secret` and `wrap_iv` are only meaningful together: the
/// long-term secret is recovered by unwrapping with the login-derived key.
/// Deletion is a tombstone (`deleted_at`) — the wrapped secret is never
/// erased while grants referencing it may still exist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub password_hash: String,
    pub wrapped_secret: Vec<u8>,
    pub wrap_iv: Vec<u8>,
    pub kdf_salt: String,
    pub role: Role,
    pub deleted_at: Option<i64>,
}

impl Principal {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A meeting and its catalog metadata. The registrant data itself lives in
/// the meeting's isolated store, never in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub title: String,
    /// Event date as entered by the owner (display string, not parsed).
    pub date: String,
    pub owner_principal_id: PrincipalId,
    pub archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Meeting {
    pub fn new(title: impl Into<String>, date: impl Into<String>, owner: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: new_id(),
            title: title.into(),
            date: date.into(),
            owner_principal_id: owner.into(),
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One registrant entry as handled in memory. At rest this is a sealed
/// payload inside the meeting store; the plaintext form never touches disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Registrant {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub zip: String,
    pub city: String,
    pub country: String,
    pub created_at: i64,
}

/// A time-boxed capability token granting unauthenticated intake access to
/// a single meeting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShareToken {
    pub id: String,
    pub meeting_id: MeetingId,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn meeting_new_sets_timestamps() {
        let m = Meeting::new("Town Hall", "2026-09-01", "p-1");
        assert_eq!(m.created_at, m.updated_at);
        assert!(!m.archived);
    }

    #[test]
    fn role_serde_roundtrip() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::Admin);
    }
}
