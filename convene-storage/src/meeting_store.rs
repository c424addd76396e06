//! Handle to one meeting's isolated store.
//!
//! Three tables per store: `meeting_meta` (key/value metadata, enough to
//! reconstruct a catalog entry during reconciliation), `meeting_keys` (one
//! wrapped data-key copy per granted principal) and `registrants` (sealed
//! payloads only — plaintext never reaches the database).

use crate::error::{StorageError, StorageResult};
use convene_crypto::{open, seal, Envelope, MeetingDataKey};
use convene_types::{now_ms, Meeting, MeetingId, Registrant};
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One wrapped data-key copy as stored inside the meeting's own store.
///
/// The email is a snapshot taken at grant time; reconciliation matches it
/// against known principals when a store has lost its catalog entry.
#[derive(Clone, Debug)]
pub struct WrappedKeyRow {
    pub principal_id: String,
    pub principal_email: String,
    pub wrapped_key: Vec<u8>,
    pub wrap_iv: Vec<u8>,
    pub created_at: i64,
}

impl WrappedKeyRow {
    pub fn envelope(&self) -> Envelope {
        Envelope {
            iv: self.wrap_iv.clone(),
            ciphertext: self.wrapped_key.clone(),
        }
    }
}

/// Handle to an opened meeting store. Cheap to clone; all clones share the
/// same underlying connection.
#[derive(Clone, Debug)]
pub struct MeetingStore {
    meeting_id: MeetingId,
    conn: Arc<Mutex<Connection>>,
}

impl MeetingStore {
    /// Opens (or creates the tables for) the store at `path`.
    pub fn open(meeting_id: &str, path: &Path) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path, "64MB", 1)?;
        let store = Self {
            meeting_id: meeting_id.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory(meeting_id: &str) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            meeting_id: meeting_id.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    fn ensure_tables(&self) -> StorageResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meeting_meta (
                key VARCHAR PRIMARY KEY,
                value VARCHAR NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meeting_keys (
                principal_id VARCHAR PRIMARY KEY,
                principal_email VARCHAR NOT NULL,
                wrapped_key BLOB NOT NULL,
                wrap_iv BLOB NOT NULL,
                created_at BIGINT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS registrants (
                id VARCHAR PRIMARY KEY,
                sealed_payload BLOB NOT NULL,
                created_at BIGINT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock only means another task panicked mid-statement;
        // the connection itself is still usable.
        match self.conn.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ── Metadata ─────────────────────────────────────────────────

    /// Writes the meeting's catalog metadata into the store.
    ///
    /// Kept in sync on every catalog update so an orphaned store can be
    /// re-adopted after catalog loss.
    pub fn write_meta(&self, meeting: &Meeting) -> StorageResult<()> {
        let conn = self.lock();
        let pairs = [
            ("title", meeting.title.clone()),
            ("date", meeting.date.clone()),
            ("owner_principal_id", meeting.owner_principal_id.clone()),
            ("archived", meeting.archived.to_string()),
            ("created_at", meeting.created_at.to_string()),
            ("updated_at", meeting.updated_at.to_string()),
        ];
        for (key, value) in pairs {
            conn.execute(
                "INSERT OR REPLACE INTO meeting_meta (key, value) VALUES (?, ?)",
                params![key, value],
            )?;
        }
        Ok(())
    }

    /// Reads the embedded metadata back as a catalog entry.
    ///
    /// Returns `None` when the store carries no (or incomplete) metadata —
    /// reconciliation treats such a store as unadoptable.
    pub fn read_meta(&self) -> StorageResult<Option<Meeting>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT key, value FROM meeting_meta")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();

        let get = |key: &str| rows.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());

        let (Some(title), Some(date), Some(owner)) =
            (get("title"), get("date"), get("owner_principal_id"))
        else {
            return Ok(None);
        };

        Ok(Some(Meeting {
            id: self.meeting_id.clone(),
            title,
            date,
            owner_principal_id: owner,
            archived: get("archived").is_some_and(|v| v == "true"),
            created_at: get("created_at").and_then(|v| v.parse().ok()).unwrap_or(0),
            updated_at: get("updated_at").and_then(|v| v.parse().ok()).unwrap_or(0),
        }))
    }

    // ── Wrapped data-key copies ──────────────────────────────────

    /// Inserts or replaces the wrapped data-key copy for a principal.
    ///
    /// Replacement keeps the exactly-one-row-per-principal invariant when a
    /// grant is re-issued.
    pub fn upsert_wrapped_key(
        &self,
        principal_id: &str,
        principal_email: &str,
        envelope: &Envelope,
    ) -> StorageResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO meeting_keys
                 (principal_id, principal_email, wrapped_key, wrap_iv, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                principal_id,
                principal_email,
                envelope.ciphertext,
                envelope.iv,
                now_ms()
            ],
        )?;
        Ok(())
    }

    /// Looks up the wrapped copy for one principal.
    pub fn wrapped_key_for(&self, principal_id: &str) -> StorageResult<Option<WrappedKeyRow>> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT principal_id, principal_email, wrapped_key, wrap_iv, created_at
             FROM meeting_keys WHERE principal_id = ?",
            params![principal_id],
            |row| {
                Ok(WrappedKeyRow {
                    principal_id: row.get(0)?,
                    principal_email: row.get(1)?,
                    wrapped_key: row.get(2)?,
                    wrap_iv: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        );
        match result {
            Ok(row) => Ok(Some(row)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every wrapped copy in the store.
    pub fn list_wrapped_keys(&self) -> StorageResult<Vec<WrappedKeyRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT principal_id, principal_email, wrapped_key, wrap_iv, created_at
             FROM meeting_keys ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(WrappedKeyRow {
                    principal_id: row.get(0)?,
                    principal_email: row.get(1)?,
                    wrapped_key: row.get(2)?,
                    wrap_iv: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Removes a principal's wrapped copy. Returns whether a row existed.
    pub fn remove_wrapped_key(&self, principal_id: &str) -> StorageResult<bool> {
        let conn = self.lock();
        let affected = conn.execute(
            "DELETE FROM meeting_keys WHERE principal_id = ?",
            params![principal_id],
        )?;
        Ok(affected > 0)
    }

    // ── Registrants ──────────────────────────────────────────────

    /// Seals a registrant under the meeting data key and stores it.
    /// Fresh IV per record.
    pub fn insert_registrant(
        &self,
        data_key: &MeetingDataKey,
        registrant: &Registrant,
    ) -> StorageResult<()> {
        let plaintext = serde_json::to_vec(registrant)?;
        let envelope = seal(data_key.as_bytes(), &plaintext)?;
        let sealed = serde_json::to_vec(&envelope)?;

        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO registrants (id, sealed_payload, created_at) VALUES (?, ?, ?)",
            params![registrant.id, sealed, registrant.created_at],
        )?;
        Ok(())
    }

    /// Opens and returns every registrant, oldest first.
    ///
    /// A wrong data key surfaces as `DecryptionFailed` on the first row —
    /// rows are never silently dropped.
    pub fn list_registrants(&self, data_key: &MeetingDataKey) -> StorageResult<Vec<Registrant>> {
        let sealed_rows: Vec<Vec<u8>> = {
            let conn = self.lock();
            let mut stmt = conn
                .prepare("SELECT sealed_payload FROM registrants ORDER BY created_at ASC, id ASC")?;
            stmt.query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect()
        };

        let mut registrants = Vec::with_capacity(sealed_rows.len());
        for sealed in sealed_rows {
            let envelope: Envelope = serde_json::from_slice(&sealed)?;
            let plaintext = open(data_key.as_bytes(), &envelope)?;
            registrants.push(serde_json::from_slice(&plaintext)?);
        }
        Ok(registrants)
    }

    /// Number of registrant rows (no decryption needed).
    pub fn count_registrants(&self) -> StorageResult<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM registrants", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Deletes one registrant row. Returns whether a row existed.
    pub fn delete_registrant(&self, registrant_id: &str) -> StorageResult<bool> {
        let conn = self.lock();
        let affected = conn.execute(
            "DELETE FROM registrants WHERE id = ?",
            params![registrant_id],
        )?;
        Ok(affected > 0)
    }
}
