//! SQLite-based session storage.
//!
//! Backs [`SessionRepository`] with the `timer_session` table. The
//! connection sits behind a mutex so the database can be shared with the
//! timer service task.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use super::data_dir;
use super::migrations;
use super::repository::{SessionRecord, SessionRepository};
use crate::error::{CoreError, DatabaseError};

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "focustimer.db";

/// SQLite database for session storage.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/focustimer/focustimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join(DEFAULT_DATABASE_FILE);
        Self::open_at(&path)
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "database opened");
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, CoreError> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Locked)
    }
}

impl SessionRepository for Database {
    fn insert(&self, record: &SessionRecord) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        let value = i64::try_from(record.contributed_ms).unwrap_or(i64::MAX);
        conn.execute(
            "INSERT INTO timer_session (date, value) VALUES (?1, ?2)",
            params![record.date, value],
        )
        .map_err(|e| DatabaseError::write(&record.date, e))?;
        Ok(conn.last_insert_rowid())
    }

    fn find_by_date(&self, date: &str) -> Result<Vec<SessionRecord>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, value FROM timer_session
                 WHERE instr(date, ?1) > 0
                 ORDER BY id",
            )
            .map_err(|e| DatabaseError::read(date, e))?;
        let rows = stmt
            .query_map(params![date], |row| {
                Ok(SessionRecord {
                    date: row.get(0)?,
                    contributed_ms: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })
            .map_err(|e| DatabaseError::read(date, e))?;

        let records = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::read(date, e))?;
        Ok(records)
    }
}
