//! Background sync handlers.

use url::Url;

use super::Engine;
use crate::Outcome;
use swcache_core::Request;

/// Periodic sync tag: refresh every entry of the current stores.
pub const PERIODIC_REFRESH_TAG: &str = "update-cache";

/// One-shot sync tag: re-fetch the install manifest.
pub const PRECACHE_SYNC_TAG: &str = "sync-precache";

impl Engine {
    pub(super) async fn on_periodic_sync(&self, tag: &str) -> Outcome {
        if tag == PERIODIC_REFRESH_TAG {
            let refreshed = self.refresh_all().await;
            tracing::info!(tag, refreshed, "periodic refresh finished");
        } else {
            tracing::debug!(tag, "ignoring unknown periodic sync tag");
        }
        Outcome::none()
    }

    pub(super) async fn on_sync(&self, tag: &str) -> Outcome {
        if tag != PRECACHE_SYNC_TAG {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Outcome::none();
        }

        let result = match self.fetch_manifest().await {
            Ok(entries) => self.db.put_entries(&self.epoch.static_store(), entries).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::info!(tag, "manifest re-cached"),
            Err(e) => tracing::warn!(tag, error = %e, "manifest sync failed"),
        }
        Outcome::none()
    }

    /// Re-fetch every stored entry; per-entry failures are logged and skipped.
    async fn refresh_all(&self) -> u64 {
        let mut refreshed = 0;

        for store in self.epoch.whitelist() {
            let entries = match self.db.list_entries(&store).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(store = %store, error = %e, "could not list store");
                    continue;
                }
            };

            for entry in entries {
                let Ok(url) = Url::parse(&entry.url) else {
                    tracing::warn!(url = %entry.url, "stored url does not parse");
                    continue;
                };
                let request = Request::get(url);
                match self.fetch_network(&request).await {
                    Ok(response) if response.is_success() => {
                        self.store(&store, &request, &response).await;
                        refreshed += 1;
                    }
                    Ok(response) => tracing::debug!(url = %entry.url, status = response.status, "refresh skipped"),
                    Err(e) => tracing::debug!(url = %entry.url, error = %e, "refresh failed"),
                }
            }
        }

        refreshed
    }
}
