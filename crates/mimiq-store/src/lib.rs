//! # mimiq-store
//!
//! One SQLite file holds all queue and schedule state for a deployment.
//! The path is always supplied by the caller; several independent stores can
//! coexist in one process.
//!
//! WAL journaling plus a busy timeout let multiple processes share the file.
//! Claim logic in the engines relies on conditional `UPDATE ... RETURNING`
//! statements, so SQLite's own write serialization is the only mutual
//! exclusion between callers. Multi-step mutations go through [`Store::with_tx`]
//! so a crash mid-operation cannot leave half-claimed rows behind.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use mimiq_core::{MimiqError, Result};

/// Handle to one mimiq database file.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at `path`, creating parent directories
    /// and running schema migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MimiqError::StoreUnavailable(format!("create {parent:?}: {e}")))?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!("opened store at {}", path.display());
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // WAL fails on in-memory databases; that is fine there.
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch("PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create tables and indexes.
    fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
            CREATE TABLE IF NOT EXISTS queues (
                name TEXT PRIMARY KEY,
                visibility_timeout_secs INTEGER NOT NULL,
                max_message_bytes INTEGER NOT NULL,
                retention_secs INTEGER NOT NULL,
                created_at INTEGER NOT NULL            -- epoch ms
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                queue_name TEXT NOT NULL REFERENCES queues(name) ON DELETE CASCADE,
                body TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL,          -- epoch ms
                available_at INTEGER NOT NULL,         -- epoch ms, send delay
                visible_until INTEGER,                 -- epoch ms, NULL = visible
                receipt_handle TEXT,                   -- current handle, rotated per claim
                receive_count INTEGER NOT NULL DEFAULT 0,
                dedup_key TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_messages_claim
                ON messages(queue_name, available_at, enqueued_at);
            CREATE INDEX IF NOT EXISTS idx_messages_handle
                ON messages(receipt_handle);
            CREATE INDEX IF NOT EXISTS idx_messages_dedup
                ON messages(queue_name, dedup_key);

            CREATE TABLE IF NOT EXISTS schedules (
                name TEXT PRIMARY KEY,
                queue_name TEXT NOT NULL,
                kind TEXT NOT NULL,                    -- 'once' | 'rate'
                body TEXT NOT NULL,
                interval_secs INTEGER,                 -- 'rate' only
                next_fire_at INTEGER,                  -- epoch ms, NULL = retired
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,           -- epoch ms
                last_fired_at INTEGER                  -- epoch ms
            );
            CREATE INDEX IF NOT EXISTS idx_schedules_due
                ON schedules(enabled, next_fire_at);
            ",
            )?;
            Ok(())
        })
    }

    /// Run a read or single-statement write against the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MimiqError::StoreUnavailable(format!("connection lock: {e}")))?;
        f(&conn)
    }

    /// Run `f` inside an immediate transaction: committed when `f` returns
    /// `Ok`, rolled back when it returns `Err`.
    pub fn with_tx<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| MimiqError::StoreUnavailable(format!("connection lock: {e}")))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                // Drop rolls the transaction back.
                Err(e)
            }
        }
    }
}
