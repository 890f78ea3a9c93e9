//! Named store management.
//!
//! A store is a namespace of entries. Deleting a store removes its entries
//! through the foreign key cascade.

use super::connection::CacheDb;
use crate::{CacheSummary, Error};
use tokio_rusqlite::params;

impl CacheDb {
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row("SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)", params![name], |row| row.get(0))
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All store names, oldest first.
    pub async fn list_stores(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no such store existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every store.
    ///
    /// Returns the number of stores removed.
    pub async fn delete_all_stores(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM stores", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Store names with their entry counts, oldest store first.
    pub async fn store_summaries(&self) -> Result<Vec<CacheSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT s.name, COUNT(e.key_hash)
                     FROM stores s LEFT JOIN entries e ON e.store = s.name
                     GROUP BY s.name
                     ORDER BY s.created_at ASC, s.name ASC",
                )?;
                let summaries = stmt
                    .query_map([], |row| Ok(CacheSummary { name: row.get(0)?, size: row.get::<_, i64>(1)? as u64 }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }
}
