pub mod feed;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod users;
pub mod votes;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

const READER_POOL_SIZE: usize = 4;

/// Fixed capacity of a feed chunk.
pub const CHUNK_CAPACITY: i64 = 1000;

/// Items per feed page.
pub const PAGE_SIZE: i64 = 12;

/// Maximum row updates per migration transaction. Keeps migration
/// transactions bounded so an aborted run leaves committed batches applied
/// and the job resumable.
pub const MIGRATION_BATCH_SIZE: usize = 500;

/// Meme database with a reader/writer split: one writer connection behind a
/// mutex, a small pool of read-only connections for feed queries.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
    chunk_capacity: i64,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_capacity(path, CHUNK_CAPACITY)
    }

    /// Open with a non-default chunk capacity. Tests use small capacities to
    /// exercise the chunk-boundary paths.
    pub fn open_with_capacity(path: &Path, chunk_capacity: i64) -> Result<Self> {
        let writer = Connection::open(path)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        schema::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers, chunk capacity {})",
            path.display(),
            READER_POOL_SIZE,
            chunk_capacity
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
            chunk_capacity,
        })
    }

    pub fn chunk_capacity(&self) -> i64 {
        self.chunk_capacity
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Writer lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Timestamps are stored as RFC 3339 UTC with millisecond precision, which
/// keeps lexicographic order identical to chronological order.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Database;

    /// Fresh database at a unique temp path. The reader pool needs a real
    /// file, so `:memory:` is not an option here.
    pub fn open_test_db(chunk_capacity: i64) -> Database {
        let path = std::env::temp_dir().join(format!("memewall-test-{}.db", uuid::Uuid::new_v4()));
        Database::open_with_capacity(&path, chunk_capacity).expect("open test db")
    }
}
