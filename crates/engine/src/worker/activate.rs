//! Activate: drop stores of older epochs and take over open pages.

use super::Engine;
use crate::{Effect, Outcome};
use swcache_core::{Broadcast, Error, WorkerState};

impl Engine {
    pub(super) async fn activate(&self) -> Result<Outcome, Error> {
        self.transition(WorkerState::Activating).await?;

        let mut removed = 0;
        for store in self.db.list_stores().await? {
            if self.epoch.owns(&store) {
                continue;
            }
            if self.db.delete_store(&store).await? {
                tracing::info!(store = %store, "deleted stale store");
                removed += 1;
            }
        }

        self.transition(WorkerState::Active).await?;
        tracing::info!(version = self.epoch.version(), removed, "activated");

        Ok(Outcome::effects(vec![
            Effect::Claim,
            Effect::Broadcast(Broadcast::SwActivated {
                version: self.epoch.version().to_string(),
                cache_name: self.epoch.static_store(),
            }),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::{ScriptedNetwork, engine_with, test_config, url};
    use crate::{Effect, Event};
    use swcache_core::{Broadcast, CacheDb, Error, Request, Response, WorkerState};

    #[tokio::test]
    async fn test_activate_deletes_stores_outside_whitelist() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get(url("https://app.test/app.css"));
        db.put_entry("test-static-v0", &request, &Response::ok("old")).await.unwrap();
        db.put_entry("test-dynamic-v0", &request, &Response::ok("old")).await.unwrap();
        db.put_entry("test-dynamic-v1", &request, &Response::ok("current")).await.unwrap();

        let engine = engine_with(test_config(), db.clone(), Arc::new(ScriptedNetwork::new()));
        engine.handle(Event::Install).await.unwrap();
        let outcome = engine.handle(Event::Activate).await.unwrap();

        let stores = db.list_stores().await.unwrap();
        assert_eq!(stores.len(), 2);
        assert!(stores.contains(&"test-static-v1".to_string()));
        assert!(stores.contains(&"test-dynamic-v1".to_string()));
        assert_eq!(engine.state().await, WorkerState::Active);

        assert_eq!(outcome.effects[0], Effect::Claim);
        assert_eq!(
            outcome.effects[1],
            Effect::Broadcast(Broadcast::SwActivated { version: "1".into(), cache_name: "test-static-v1".into() })
        );
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = engine_with(test_config(), db, Arc::new(ScriptedNetwork::new()));
        let err = engine.handle(Event::Activate).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(engine.state().await, WorkerState::Installing);
    }
}
