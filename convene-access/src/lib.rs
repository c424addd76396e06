//! Share-token ledger — time-boxed, unauthenticated intake capability.
//!
//! A share token grants write-only access to one meeting's intake form.
//! Tokens are bearer capabilities: unguessable, tied to a single meeting,
//! and garbage-collected on a fixed retention window regardless of use.
//! Resolution of an unknown token is indistinguishable from a swept one.

use convene_types::{now_ms, MeetingId, ShareToken};
use duckdb::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),
}

pub type AccessResult<T> = Result<T, AccessError>;

// ============================================================================
// Configuration
// ============================================================================

/// Retention and sweep cadence for share tokens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Tokens older than this many minutes are deleted by the sweep.
    pub retention_mins: i64,
    /// Interval between background sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            retention_mins: 120,
            sweep_interval_secs: 120,
        }
    }
}

impl SweepConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    fn retention_ms(&self) -> i64 {
        self.retention_mins * 60_000
    }
}

// ============================================================================
// ShareTokenLedger
// ============================================================================

/// Issues, resolves and expires share tokens. Cheap to clone; all clones
/// share one underlying database.
#[derive(Clone)]
pub struct ShareTokenLedger {
    conn: Arc<Mutex<Connection>>,
    retention_ms: i64,
}

impl ShareTokenLedger {
    /// Opens a ledger backed by a DuckDB file.
    pub fn open(db_path: &Path, config: &SweepConfig) -> AccessResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA memory_limit='32MB'; PRAGMA threads=1;")?;
        Self::with_connection(conn, config)
    }

    /// Opens an in-memory ledger (for testing).
    pub fn open_in_memory(config: &SweepConfig) -> AccessResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    fn with_connection(conn: Connection, config: &SweepConfig) -> AccessResult<Self> {
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
            retention_ms: config.retention_ms(),
        };
        ledger.ensure_tables()?;
        Ok(ledger)
    }

    fn ensure_tables(&self) -> AccessResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS share_tokens (
                id VARCHAR PRIMARY KEY,
                meeting_id VARCHAR NOT NULL,
                created_at BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_share_tokens_created
                ON share_tokens(created_at);",
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

    /// Creates and persists a new token for `meeting_id`.
    ///
    /// No limit on outstanding tokens per meeting; callers refresh as often
    /// as they like and let the sweep clean up.
    pub fn issue(&self, meeting_id: &str) -> AccessResult<ShareToken> {
        let token = ShareToken {
            id: uuid::Uuid::new_v4().to_string(),
            meeting_id: meeting_id.to_string(),
            created_at: now_ms(),
        };
        let conn = self.lock();
        conn.execute(
            "INSERT INTO share_tokens (id, meeting_id, created_at) VALUES (?, ?, ?)",
            params![token.id, token.meeting_id, token.created_at],
        )?;
        debug!(meeting_id, token_id = %token.id, "issued share token");
        Ok(token)
    }

    /// Resolves a token to its meeting id.
    ///
    /// Returns `None` for unknown, swept and never-issued tokens alike —
    /// callers cannot learn whether a token ever existed.
    pub fn resolve(&self, token_id: &str) -> AccessResult<Option<MeetingId>> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT meeting_id FROM share_tokens WHERE id = ?",
            params![token_id],
            |row| row.get(0),
        );
        match result {
            Ok(meeting_id) => Ok(Some(meeting_id)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every token older than the retention window, used or not.
    /// Returns the number of tokens deleted.
    pub fn sweep_expired(&self, now_ms: i64) -> AccessResult<usize> {
        let cutoff = now_ms - self.retention_ms;
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM share_tokens WHERE created_at < ?",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    /// Drops every token for a meeting (called when the meeting itself is
    /// deleted).
    pub fn purge_meeting(&self, meeting_id: &str) -> AccessResult<usize> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM share_tokens WHERE meeting_id = ?",
            params![meeting_id],
        )?;
        Ok(deleted)
    }

    /// Outstanding token count (diagnostics).
    pub fn len(&self) -> AccessResult<usize> {
        let conn = self.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM share_tokens", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> AccessResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Spawns the supervised background sweep.
    ///
    /// A failing sweep is logged and the loop keeps running; each sweep is
    /// all-or-nothing and independent of its siblings.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let ledger = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match ledger.sweep_expired(now_ms()) {
                    Ok(0) => {}
                    Ok(n) => debug!(deleted = n, "swept expired share tokens"),
                    Err(e) => warn!(error = %e, "share token sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_resolve() {
        let ledger = ShareTokenLedger::open_in_memory(&SweepConfig::default()).unwrap();
        let token = ledger.issue("m-1").unwrap();
        assert_eq!(ledger.resolve(&token.id).unwrap().as_deref(), Some("m-1"));
    }

    #[test]
    fn unknown_token_resolves_to_none() {
        let ledger = ShareTokenLedger::open_in_memory(&SweepConfig::default()).unwrap();
        assert!(ledger.resolve("never-issued").unwrap().is_none());
    }

    #[test]
    fn tokens_are_unguessable_and_unlimited() {
        let ledger = ShareTokenLedger::open_in_memory(&SweepConfig::default()).unwrap();
        let a = ledger.issue("m-1").unwrap();
        let b = ledger.issue("m-1").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[test]
    fn purge_meeting_drops_only_its_tokens() {
        let ledger = ShareTokenLedger::open_in_memory(&SweepConfig::default()).unwrap();
        ledger.issue("m-1").unwrap();
        ledger.issue("m-1").unwrap();
        let keep = ledger.issue("m-2").unwrap();

        assert_eq!(ledger.purge_meeting("m-1").unwrap(), 2);
        assert_eq!(ledger.resolve(&keep.id).unwrap().as_deref(), Some("m-2"));
    }
}
