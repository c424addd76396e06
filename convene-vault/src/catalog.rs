//! Catalog seam — the consumed collaborator interface.
//!
//! The global catalog (a relational store outside this core) supplies the
//! list of known meetings for reconciliation and resolves principals by
//! email snapshot when an orphaned store is considered for adoption. The
//! crypto path never goes through the catalog.

use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use convene_types::{Meeting, MeetingId, Principal};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What this core needs from the catalog collaborator.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All meetings known to the catalog.
    async fn list_meetings(&self) -> VaultResult<Vec<Meeting>>;

    /// One meeting by id.
    async fn meeting(&self, meeting_id: &str) -> VaultResult<Option<Meeting>>;

    /// Registers a meeting (used when reconciliation adopts an orphaned
    /// store back into the catalog).
    async fn insert_meeting(&self, meeting: Meeting) -> VaultResult<()>;

    /// Non-deleted principals whose email matches any of `emails`.
    async fn principals_by_emails(&self, emails: &[String]) -> VaultResult<Vec<Principal>>;
}

/// In-memory catalog for tests and embedded use.
#[derive(Default)]
pub struct MemoryCatalog {
    meetings: RwLock<HashMap<MeetingId, Meeting>>,
    principals: RwLock<HashMap<String, Principal>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a principal record (test/embedding helper; principal CRUD is
    /// otherwise the identity collaborator's job).
    pub async fn insert_principal(&self, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(principal.id.clone(), principal);
    }

    pub async fn remove_meeting(&self, meeting_id: &str) {
        self.meetings.write().await.remove(meeting_id);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_meetings(&self) -> VaultResult<Vec<Meeting>> {
        let mut meetings: Vec<Meeting> = self.meetings.read().await.values().cloned().collect();
        meetings.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(meetings)
    }

    async fn meeting(&self, meeting_id: &str) -> VaultResult<Option<Meeting>> {
        Ok(self.meetings.read().await.get(meeting_id).cloned())
    }

    async fn insert_meeting(&self, meeting: Meeting) -> VaultResult<()> {
        let mut meetings = self.meetings.write().await;
        if meetings.contains_key(&meeting.id) {
            return Err(VaultError::Catalog(format!(
                "meeting {} already registered",
                meeting.id
            )));
        }
        meetings.insert(meeting.id.clone(), meeting);
        Ok(())
    }

    async fn principals_by_emails(&self, emails: &[String]) -> VaultResult<Vec<Principal>> {
        let principals = self.principals.read().await;
        Ok(principals
            .values()
            .filter(|p| !p.is_deleted() && emails.iter().any(|e| e == &p.email))
            .cloned()
            .collect())
    }
}
