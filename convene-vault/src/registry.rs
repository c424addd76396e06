//! Meeting store registry — the table of live store handles.
//!
//! Per meeting, the lifecycle is Unknown → Open → Closed/Deleted. `open`
//! is memoized and single-flight per meeting id: two concurrent callers
//! for the same id end up sharing one handle, never two divergent stores.
//! `reconcile` runs once at process start and squares the catalog against
//! the physical volume, adopting orphaned stores when their embedded
//! grants match a known principal.

use crate::catalog::Catalog;
use crate::error::{VaultError, VaultResult};
use convene_storage::{MeetingStore, StoreBackend};
use convene_types::{Meeting, MeetingId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Outcome of one startup reconciliation pass.
///
/// Every catalog meeting and every physical store lands in exactly one
/// bucket; a skipped store never aborts the pass.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    /// Catalog meetings whose store was found and opened.
    pub opened: Vec<MeetingId>,
    /// Orphaned stores matched to a known principal and re-cataloged.
    pub adopted: Vec<MeetingId>,
    /// Catalog meetings with no physical store.
    pub missing: Vec<MeetingId>,
    /// Stores that could not be opened or adopted, with the reason.
    pub skipped: Vec<SkippedStore>,
}

/// One store reconciliation gave up on.
#[derive(Debug, Serialize)]
pub struct SkippedStore {
    pub meeting_id: MeetingId,
    pub reason: String,
}

/// Owns the live handles to every open meeting store.
pub struct MeetingStoreRegistry {
    backend: Arc<dyn StoreBackend>,
    catalog: Arc<dyn Catalog>,
    handles: RwLock<HashMap<MeetingId, MeetingStore>>,
    open_guards: Mutex<HashMap<MeetingId, Arc<Mutex<()>>>>,
}

impl MeetingStoreRegistry {
    pub fn new(backend: Arc<dyn StoreBackend>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            backend,
            catalog,
            handles: RwLock::new(HashMap::new()),
            open_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Squares the catalog against the physical volume. Run once at
    /// process start, before request traffic.
    ///
    /// Each meeting is processed all-or-nothing: its store is opened,
    /// adopted, reported missing, or skipped with a logged reason. One
    /// corrupt store never blocks the rest of startup.
    pub async fn reconcile(&self) -> VaultResult<ReconcileReport> {
        let known = self.catalog.list_meetings().await?;
        let physical = self.backend.list().await?;
        let known_ids: HashSet<&str> = known.iter().map(|m| m.id.as_str()).collect();

        let mut report = ReconcileReport::default();

        for meeting in &known {
            if !physical.contains(&meeting.id) {
                report.missing.push(meeting.id.clone());
                continue;
            }
            match self.backend.open(&meeting.id).await {
                Ok(store) => {
                    self.handles
                        .write()
                        .await
                        .insert(meeting.id.clone(), store);
                    report.opened.push(meeting.id.clone());
                }
                Err(e) => {
                    warn!(meeting_id = %meeting.id, error = %e, "skipping unopenable store");
                    report.skipped.push(SkippedStore {
                        meeting_id: meeting.id.clone(),
                        reason: format!("open failed: {e}"),
                    });
                }
            }
        }

        for meeting_id in &physical {
            if known_ids.contains(meeting_id.as_str()) {
                continue;
            }
            match self.try_adopt(meeting_id).await {
                Ok(store) => {
                    self.handles
                        .write()
                        .await
                        .insert(meeting_id.clone(), store);
                    info!(meeting_id, "adopted orphaned store into catalog");
                    report.adopted.push(meeting_id.clone());
                }
                Err(reason) => {
                    warn!(meeting_id, reason, "skipping orphaned store");
                    report.skipped.push(SkippedStore {
                        meeting_id: meeting_id.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            opened = report.opened.len(),
            adopted = report.adopted.len(),
            missing = report.missing.len(),
            skipped = report.skipped.len(),
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Attempts to re-catalog an orphaned physical store.
    ///
    /// Adoption requires embedded metadata and at least one wrapped-key
    /// row whose email snapshot matches a known, non-deleted principal.
    async fn try_adopt(&self, meeting_id: &str) -> Result<MeetingStore, String> {
        let store = self
            .backend
            .open(meeting_id)
            .await
            .map_err(|e| format!("open failed: {e}"))?;

        let meta = store
            .read_meta()
            .map_err(|e| format!("metadata read failed: {e}"))?
            .ok_or_else(|| "no embedded metadata".to_string())?;

        let emails: Vec<String> = store
            .list_wrapped_keys()
            .map_err(|e| format!("wrapped-key read failed: {e}"))?
            .into_iter()
            .map(|row| row.principal_email)
            .collect();
        if emails.is_empty() {
            return Err("no wrapped-key rows to match against".to_string());
        }

        let matches = self
            .catalog
            .principals_by_emails(&emails)
            .await
            .map_err(|e| format!("principal lookup failed: {e}"))?;
        if matches.is_empty() {
            return Err("no known principal matches embedded grants".to_string());
        }

        self.catalog
            .insert_meeting(meta)
            .await
            .map_err(|e| format!("catalog insert failed: {e}"))?;
        Ok(store)
    }

    /// Returns the open handle for a meeting, opening or lazily creating
    /// the store as needed. Idempotent and single-flight per meeting id.
    ///
    /// Fails with [`VaultError::MeetingStoreUnavailable`] when the id is
    /// unknown to the catalog and nothing exists physically.
    pub async fn open(&self, meeting_id: &str) -> VaultResult<MeetingStore> {
        if let Some(handle) = self.handles.read().await.get(meeting_id) {
            return Ok(handle.clone());
        }

        let guard = self.guard_for(meeting_id).await;
        let _held = guard.lock().await;

        // A racing caller may have finished while we waited on the guard.
        if let Some(handle) = self.handles.read().await.get(meeting_id) {
            return Ok(handle.clone());
        }

        let store = if self.backend.exists(meeting_id).await? {
            self.backend.open(meeting_id).await?
        } else if let Some(meeting) = self.catalog.meeting(meeting_id).await? {
            debug!(meeting_id, "allocating store for freshly created meeting");
            let store = self.backend.create(meeting_id).await?;
            store.write_meta(&meeting)?;
            store
        } else {
            return Err(VaultError::MeetingStoreUnavailable(meeting_id.to_string()));
        };

        self.handles
            .write()
            .await
            .insert(meeting_id.to_string(), store.clone());
        Ok(store)
    }

    /// Allocates the store for a newly created meeting and embeds its
    /// metadata. The caller registers the meeting in the catalog and
    /// follows up with the owner's grant.
    pub async fn create(&self, meeting: &Meeting) -> VaultResult<MeetingStore> {
        let guard = self.guard_for(&meeting.id).await;
        let _held = guard.lock().await;

        if let Some(handle) = self.handles.read().await.get(&meeting.id) {
            return Ok(handle.clone());
        }

        let store = self.backend.create(&meeting.id).await?;
        store.write_meta(meeting)?;
        self.handles
            .write()
            .await
            .insert(meeting.id.clone(), store.clone());
        info!(meeting_id = %meeting.id, "created meeting store");
        Ok(store)
    }

    /// Closes the handle (if any) and physically removes the store.
    /// Safe to call for a meeting that was never opened.
    pub async fn delete(&self, meeting_id: &str) -> VaultResult<()> {
        let guard = self.guard_for(meeting_id).await;
        let _held = guard.lock().await;

        self.handles.write().await.remove(meeting_id);
        self.backend.delete(meeting_id).await?;
        info!(meeting_id, "deleted meeting store");

        self.open_guards.lock().await.remove(meeting_id);
        Ok(())
    }

    /// Whether a handle is currently open for the meeting.
    pub async fn is_open(&self, meeting_id: &str) -> bool {
        self.handles.read().await.contains_key(meeting_id)
    }

    /// Ids of every currently open store.
    pub async fn open_ids(&self) -> Vec<MeetingId> {
        let mut ids: Vec<MeetingId> = self.handles.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn guard_for(&self, meeting_id: &str) -> Arc<Mutex<()>> {
        let mut guards = self.open_guards.lock().await;
        guards
            .entry(meeting_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
