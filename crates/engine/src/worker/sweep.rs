//! Periodic removal of entries older than the retention window.

use chrono::Utc;

use super::Engine;
use swcache_core::Error;

impl Engine {
    /// Delete current-epoch entries whose `Date` header is past retention.
    ///
    /// Entries without a parseable `Date` are kept. Returns the number
    /// removed.
    pub async fn sweep(&self) -> Result<u64, Error> {
        let cutoff = Utc::now() - self.config.retention();
        let mut removed = 0;

        for store in self.epoch.whitelist() {
            for entry in self.db.list_entries(&store).await? {
                let Some(date) = entry.date else { continue };
                if date < cutoff && self.db.delete_entry(&store, &entry.key_hash).await? {
                    tracing::debug!(store = %store, url = %entry.url, date = %date, "swept");
                    removed += 1;
                }
            }
        }

        tracing::info!(version = self.epoch.version(), removed, "sweep finished");
        Ok(removed)
    }
}
