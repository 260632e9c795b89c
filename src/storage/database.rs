use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Result as SqlResult};

/// Bumped whenever the statements passed to [`Database::open`] change.
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite connection holding the chat collections.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file and applies `schema`.
    pub fn open<P: AsRef<Path>>(path: P, schema: &[&str]) -> SqlResult<Self> {
        let conn = Connection::open(path)?;
        // Other clients may hold the file briefly.
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::prepare(conn, schema)
    }

    pub fn open_in_memory(schema: &[&str]) -> SqlResult<Self> {
        Self::prepare(Connection::open_in_memory()?, schema)
    }

    fn prepare(conn: Connection, schema: &[&str]) -> SqlResult<Self> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            log::debug!("Migrating chat database from schema {version} to {SCHEMA_VERSION}");
        }
        for statement in schema {
            conn.execute(statement, [])?;
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
