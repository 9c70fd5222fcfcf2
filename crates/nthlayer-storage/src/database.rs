//! SQLite handle for the deployment-event store.
//!
//! Schema changes ship as numbered SQL files under `migrations/`, embedded
//! at compile time. Applied versions are tracked in a `schema_history`
//! ledger, so opening a store always upgrades it to the newest schema
//! before any event is written.
//!
//! Adding a migration: drop `migrations/NNN_description.sql` next to the
//! existing ones and append an entry to `MIGRATIONS`.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

/// DDL for the migration ledger itself. Kept outside the numbered
/// migrations so version 1 can be recorded like any other.
const HISTORY_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_history (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// One embedded schema migration.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Every migration, oldest first.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial",
    sql: include_str!("migrations/001_initial.sql"),
}];

/// Owned SQLite connection with the event-store schema applied.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the event store at `path` and bring its schema up
    /// to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating event store directory {parent:?}"))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening event store at {path:?}"))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // WAL lets webhook inserts proceed alongside correlation reads.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        debug!("[Storage] event store open at {:?}", path);
        Self::from_connection(conn)
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Apply every migration the ledger has not seen. Each migration
    /// commits atomically with its ledger row, so a failed upgrade leaves
    /// the store at the previous version instead of half-migrated.
    fn migrate(&self) -> Result<()> {
        self.conn.execute(HISTORY_TABLE_DDL, [])?;

        let applied = self.applied_version();
        let pending: Vec<&Migration> = MIGRATIONS
            .iter()
            .filter(|migration| migration.version > applied)
            .collect();
        if pending.is_empty() {
            debug!("[Storage] event store schema v{} is current", applied);
            return Ok(());
        }

        let target = pending.last().map(|m| m.version).unwrap_or(applied);
        info!(
            "[Storage] upgrading event store schema v{} -> v{}",
            applied, target
        );

        for migration in pending {
            let tx = self.conn.unchecked_transaction()?;
            self.conn.execute_batch(migration.sql).map_err(|e| {
                warn!(
                    "[Storage] migration v{} ({}) rolled back: {}",
                    migration.version, migration.name, e
                );
                anyhow!(
                    "event store migration v{} ({}) failed: {}",
                    migration.version,
                    migration.name,
                    e
                )
            })?;
            self.conn.execute(
                "INSERT OR REPLACE INTO schema_history (version, name, applied_at)
                 VALUES (?1, ?2, datetime('now'))",
                rusqlite::params![migration.version, migration.name],
            )?;
            tx.commit()?;
            debug!(
                "[Storage] applied migration v{} ({})",
                migration.version, migration.name
            );
        }
        Ok(())
    }

    /// Newest version in the ledger; 0 for a fresh store.
    fn applied_version(&self) -> i64 {
        self.conn
            .query_row(
                "SELECT IFNULL(MAX(version), 0) FROM schema_history",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0)
    }

    /// Borrow the underlying connection for queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` atomically. Webhook inserts go through here so the
    /// idempotency check and the row write cannot interleave with a
    /// concurrent redelivery.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&self.conn)?;
        tx.commit()?;
        Ok(value)
    }
}
