//! Opening the store database.

use std::path::Path;

use super::migrations;
use crate::Error;
use tokio_rusqlite::Connection;

/// Pragmas applied to every connection before migrations.
///
/// Foreign keys must be on for store deletion to cascade to entries.
const PRAGMAS: &[(&str, &str)] = &[
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    ("temp_store", "MEMORY"),
    ("foreign_keys", "ON"),
    ("busy_timeout", "5000"),
];

/// Handle to the store database.
///
/// Statements run on tokio-rusqlite's background thread; clones share it.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the database file at `path`.
    ///
    /// Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::InvalidInput(format!("cannot create {}: {e}", parent.display())))?;
        }

        tracing::debug!(path = %path.display(), "opening store database");
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Private in-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| -> Result<(), Error> {
            for (name, value) in PRAGMAS {
                conn.pragma_update(None, name, value)?;
            }
            Ok(())
        })
        .await
        .map_err(Error::from)?;

        migrations::run(&conn).await?;
        Ok(Self { conn })
    }
}
