//! Control messages posted by pages.

use super::Engine;
use crate::{Effect, MessageEvent, Outcome};
use swcache_core::{ControlMessage, Error, Reply};

impl Engine {
    pub(super) async fn on_message(&self, message: MessageEvent) -> Result<Outcome, Error> {
        let MessageEvent { data, reply } = message;
        let Some(control) = ControlMessage::parse(&data) else {
            tracing::debug!(data = %data, "ignoring unknown message");
            return Ok(Outcome::none());
        };

        let (answer, outcome) = match control {
            ControlMessage::SkipWaiting => (None, Outcome::effects(vec![Effect::SkipWaiting])),
            ControlMessage::ClearCache => {
                let removed = self.db.delete_all_stores().await?;
                tracing::info!(removed, "cleared all stores");
                (Some(Reply::CacheCleared), Outcome::none())
            }
            ControlMessage::GetCacheInfo => {
                let (caches, total) = self.summaries().await?;
                (Some(Reply::CacheInfo { caches, total }), Outcome::none())
            }
            ControlMessage::GetCacheStatus => {
                let (caches, total) = self.summaries().await?;
                (Some(Reply::CacheStatus { caches, total }), Outcome::none())
            }
            ControlMessage::CheckVersion => (
                Some(Reply::VersionInfo {
                    version: self.epoch.version().to_string(),
                    app_name: self.config.app_name.clone(),
                    cache_name: self.epoch.static_store(),
                }),
                Outcome::none(),
            ),
        };

        if let (Some(answer), Some(port)) = (answer, reply)
            && port.send(answer).is_err()
        {
            tracing::debug!(message = ?control, "reply port closed");
        }
        Ok(outcome)
    }

    async fn summaries(&self) -> Result<(Vec<swcache_core::CacheSummary>, u64), Error> {
        let caches = self.db.store_summaries().await?;
        let total: u64 = caches.iter().map(|c| c.size).sum();
        Ok((caches, total))
    }
}
