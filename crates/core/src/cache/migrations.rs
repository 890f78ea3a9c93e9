//! Schema migrations for the store database.
//!
//! Applied versions are recorded in `_migrations`; each pending migration
//! runs with its bookkeeping row inside one transaction.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered `(version, SQL)` pairs. Versions only ever grow.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_cache_stores.sql"))];

/// Bring the schema up to the latest version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            tracing::debug!(version, "applying store migration");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
