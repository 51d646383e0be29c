//! SQLite state backend

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Baseline, LedgerEntries, Scope};
use crate::schema::{CREATE_SCHEMA, SCHEMA_VERSION};
use crate::store::{LedgerStore, StateStore};

/// SQLite database holding baselines and the ledger
pub struct StateDatabase {
    conn: Connection,
}

impl StateDatabase {
    /// Open or create a state database.
    ///
    /// A file that exists but is not a usable database is still opened: its
    /// loads read as empty and its saves fail.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        if let Err(e) = db.initialize() {
            warn!(path = %path.display(), error = %e, "state database unusable, treating as empty");
        }
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        let needs_init: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_info'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count == 0)?;

        if needs_init {
            self.conn.execute_batch(CREATE_SCHEMA)?;
            self.conn.execute(
                "INSERT INTO schema_info (version, description) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, "Initial schema"],
            )?;
        }

        Ok(())
    }

    fn query_baseline(&self, scope: &Scope) -> Result<Baseline> {
        let mut stmt = self
            .conn
            .prepare("SELECT pkg_name, version FROM baselines WHERE scope = ?1")?;

        let rows = stmt.query_map(params![scope.key()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        rows.collect::<std::result::Result<Baseline, _>>()
            .map_err(Error::Sqlite)
    }

    fn query_ledger(&self, scope: &Scope) -> Result<LedgerEntries> {
        let mut stmt = self
            .conn
            .prepare("SELECT change_key, detected_at FROM ledger WHERE scope = ?1")?;

        let rows = stmt.query_map(params![scope.key()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = LedgerEntries::new();
        for row in rows {
            let (key, stamp) = row?;
            match DateTime::parse_from_rfc3339(&stamp) {
                Ok(dt) => {
                    entries.insert(key, dt.with_timezone(&Utc));
                }
                Err(_) => warn!(scope = %scope, key = %key, "dropping unparsable ledger timestamp"),
            }
        }
        Ok(entries)
    }

    fn query_scopes(&self) -> Result<Vec<Scope>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT scope FROM baselines ORDER BY scope")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut scopes = Vec::new();
        for row in rows {
            let key = row?;
            match key.parse() {
                Ok(scope) => scopes.push(scope),
                Err(_) => warn!(scope = %key, "skipping malformed scope key"),
            }
        }
        Ok(scopes)
    }
}

impl StateStore for StateDatabase {
    fn load_baseline(&self, scope: &Scope) -> Baseline {
        self.query_baseline(scope).unwrap_or_else(|e| {
            warn!(scope = %scope, error = %e, "cannot read baseline, treating as empty");
            Baseline::new()
        })
    }

    fn save_baseline(&self, scope: &Scope, baseline: &Baseline) -> Result<()> {
        let key = scope.key();
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM baselines WHERE scope = ?1", params![key])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO baselines (scope, pkg_name, version, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (name, version) in baseline {
                stmt.execute(params![key, name, version, now])?;
            }
        }
        tx.commit()?;

        debug!(scope = %scope, packages = baseline.len(), "stored baseline");
        Ok(())
    }

    fn scopes(&self) -> Vec<Scope> {
        self.query_scopes().unwrap_or_else(|e| {
            warn!(error = %e, "cannot list scopes");
            Vec::new()
        })
    }
}

impl LedgerStore for StateDatabase {
    fn load_ledger(&self, scope: &Scope) -> LedgerEntries {
        self.query_ledger(scope).unwrap_or_else(|e| {
            warn!(scope = %scope, error = %e, "cannot read ledger, treating as empty");
            LedgerEntries::new()
        })
    }

    fn save_ledger(&self, scope: &Scope, entries: &LedgerEntries) -> Result<()> {
        let key = scope.key();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM ledger WHERE scope = ?1", params![key])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ledger (scope, change_key, detected_at) VALUES (?1, ?2, ?3)",
            )?;
            for (change_key, detected_at) in entries {
                stmt.execute(params![key, change_key, detected_at.to_rfc3339()])?;
            }
        }
        tx.commit()?;

        debug!(scope = %scope, entries = entries.len(), "stored ledger");
        Ok(())
    }
}
