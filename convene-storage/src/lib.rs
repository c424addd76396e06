//! Per-meeting isolated storage for Convene.
//!
//! Every meeting owns one DuckDB database in its own folder. The database
//! carries the meeting's metadata, the wrapped data-key copies for each
//! granted principal, and the sealed registrant records. Nothing sensitive
//! is readable without first unwrapping the meeting data key.
//!
//! # Architecture
//!
//! - `StoreBackend` is the capability seam over the physical volume:
//!   enumerate/create/open/delete a named store. The folder-per-meeting
//!   implementation is the one shipped; the backend is picked by
//!   configuration at startup.
//! - `MeetingStore` is a handle to one opened store. Registrant payloads
//!   are sealed before they reach the database and opened on the way out.

mod backend;
mod error;
mod export;
mod meeting_store;

pub use backend::{BackendConfig, FolderBackend, StoreBackend};
pub use error::{StorageError, StorageResult};
pub use export::render_csv;
pub use meeting_store::{MeetingStore, WrappedKeyRow};

/// Open a DuckDB connection with stale WAL recovery and resource limits.
///
/// If the initial open fails and a `.wal` file exists alongside the
/// database, it is removed and the open is retried once. Handles the common
/// case where an unclean shutdown leaves a WAL file that prevents
/// reopening.
///
/// `memory_limit` and `threads` cap per-database resource usage (DuckDB
/// defaults to ~80% of system RAM and all cores, far too aggressive when
/// one database is open per meeting).
pub(crate) fn open_duckdb_with_wal_recovery(
    path: &std::path::Path,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<duckdb::Connection> {
    let conn = match duckdb::Connection::open(path) {
        Ok(c) => c,
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if wal_path.exists() {
                tracing::warn!(
                    "DuckDB open failed, removing stale WAL and retrying: {}",
                    wal_path.display()
                );
                if std::fs::remove_file(&wal_path).is_ok() {
                    let c = duckdb::Connection::open(path)?;
                    apply_resource_limits(&c, memory_limit, threads)?;
                    return Ok(c);
                }
            }
            return Err(first_err.into());
        }
    };
    apply_resource_limits(&conn, memory_limit, threads)?;
    Ok(conn)
}

fn apply_resource_limits(
    conn: &duckdb::Connection,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{}'; PRAGMA threads={};",
        memory_limit, threads
    ))?;
    Ok(())
}
