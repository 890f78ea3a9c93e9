//! Registration: which engine is active, which one is waiting.
//!
//! A new epoch is installed next to the active one. Only when install
//! succeeds does it replace the active engine; a failed install leaves the
//! previous epoch serving.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{Effect, Engine, Event, Outcome};
use swcache_core::{ControlMessage, Error, Request, Response};

#[derive(Default)]
pub struct Registration {
    active: RwLock<Option<Arc<Engine>>>,
    waiting: RwLock<Option<Arc<Engine>>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn active(&self) -> Option<Arc<Engine>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Engine>> {
        self.waiting.read().await.clone()
    }

    /// Install `engine` and activate it when allowed.
    ///
    /// It activates immediately if install asked to skip waiting or if
    /// nothing is active yet; otherwise it waits. Returns the effects the
    /// host should apply.
    pub async fn update(&self, engine: Engine) -> Result<Vec<Effect>, Error> {
        let engine = Arc::new(engine);
        let installed = engine.handle(Event::Install).await?;

        let nothing_active = self.active.read().await.is_none();
        if installed.has_effect(&Effect::SkipWaiting) || nothing_active {
            return self.promote(engine).await;
        }

        let previous = self.waiting.write().await.replace(engine);
        if let Some(previous) = previous {
            previous.retire().await;
        }
        Ok(Vec::new())
    }

    /// Promote the waiting engine, if any.
    pub async fn skip_waiting(&self) -> Result<Vec<Effect>, Error> {
        let waiting = self.waiting.write().await.take();
        match waiting {
            Some(engine) => self.promote(engine).await,
            None => Ok(Vec::new()),
        }
    }

    /// Route an event to the engine that should handle it.
    ///
    /// `SKIP_WAITING` goes to the waiting engine when there is one. With no
    /// active engine, fetches pass through and everything else is dropped.
    pub async fn dispatch(&self, event: Event) -> Result<Outcome, Error> {
        let skip_waiting = matches!(
            &event,
            Event::Message(message) if ControlMessage::parse(&message.data) == Some(ControlMessage::SkipWaiting)
        );
        if skip_waiting && let Some(waiting) = self.waiting().await {
            let outcome = waiting.handle(event).await?;
            let effects = if outcome.has_effect(&Effect::SkipWaiting) {
                self.skip_waiting().await?
            } else {
                Vec::new()
            };
            return Ok(Outcome { response: None, effects });
        }

        match self.active().await {
            Some(engine) => engine.handle(event).await,
            None => {
                tracing::debug!(kind = event.kind(), "no active engine");
                Ok(Outcome::none())
            }
        }
    }

    /// Handle a fetch through the active engine; `None` means pass through.
    pub async fn fetch(&self, request: Request) -> Result<Option<Response>, Error> {
        Ok(self.dispatch(Event::Fetch(request)).await?.response)
    }

    /// Activate `engine` in place of the current one.
    ///
    /// The previous engine is retired and its revalidations drained before
    /// Activate purges stale stores, so none of its writes land afterwards.
    /// While it drains, requests pass through.
    async fn promote(&self, engine: Arc<Engine>) -> Result<Vec<Effect>, Error> {
        if let Some(previous) = self.active().await {
            previous.retire().await;
            previous.settle().await;
        }

        let mut active = self.active.write().await;
        let outcome = engine.handle(Event::Activate).await?;
        *active = Some(engine);
        Ok(outcome.effects)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::MessageEvent;
    use crate::testing::{ScriptedNetwork, engine_with, test_config, url};
    use swcache_core::{AppConfig, Broadcast, CacheDb, Response, WorkerState};

    fn versioned(version: &str, precache: &[&str]) -> AppConfig {
        AppConfig {
            version: version.into(),
            precache: precache.iter().map(|p| p.to_string()).collect(),
            ..test_config()
        }
    }

    #[tokio::test]
    async fn test_first_update_activates() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://app.test/", Response::ok("v1"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let registration = Registration::new();

        let effects = registration
            .update(engine_with(versioned("1", &["/"]), db, network))
            .await
            .unwrap();

        assert!(effects.contains(&Effect::Claim));
        assert!(effects.contains(&Effect::Broadcast(Broadcast::SwActivated {
            version: "1".into(),
            cache_name: "test-static-v1".into(),
        })));
        let active = registration.active().await.unwrap();
        assert_eq!(active.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn test_new_version_replaces_old_stores() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://app.test/", Response::ok("shell"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let registration = Registration::new();

        registration
            .update(engine_with(versioned("1", &["/"]), db.clone(), network.clone()))
            .await
            .unwrap();
        let old = registration.active().await.unwrap();
        registration
            .update(engine_with(versioned("2", &["/"]), db.clone(), network))
            .await
            .unwrap();

        assert_eq!(old.state().await, WorkerState::Redundant);
        assert_eq!(registration.active().await.unwrap().epoch().version(), "2");
        assert!(!db.has_store("test-static-v1").await.unwrap());
        assert_eq!(db.count_entries("test-static-v2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_epoch() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://app.test/", Response::ok("shell"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let registration = Registration::new();

        registration
            .update(engine_with(versioned("1", &["/"]), db.clone(), network.clone()))
            .await
            .unwrap();
        network.fail("https://app.test/missing.css");
        let err = registration
            .update(engine_with(versioned("2", &["/", "/missing.css"]), db.clone(), network))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InstallFailed(_)));
        let active = registration.active().await.unwrap();
        assert_eq!(active.epoch().version(), "1");
        assert_eq!(active.state().await, WorkerState::Active);
        assert_eq!(db.count_entries("test-static-v1").await.unwrap(), 1);
        assert!(registration.waiting().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_without_active_engine_passes_through() {
        let registration = Registration::new();
        let response = registration
            .fetch(Request::get(url("https://app.test/app.js")))
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_messages_reach_active_engine() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let registration = Registration::new();
        registration
            .update(engine_with(versioned("7", &[]), db, Arc::new(ScriptedNetwork::new())))
            .await
            .unwrap();

        let (event, rx) = MessageEvent::with_reply(json!({"type": "CHECK_VERSION"}));
        registration.dispatch(Event::Message(event)).await.unwrap();
        assert!(matches!(rx.await.unwrap(), swcache_core::Reply::VersionInfo { version, .. } if version == "7"));
    }

    #[tokio::test]
    async fn test_skip_waiting_message_promotes_waiting_engine() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        let registration = Registration::new();
        registration
            .update(engine_with(versioned("1", &[]), db.clone(), network.clone()))
            .await
            .unwrap();

        let next = engine_with(versioned("2", &[]), db, network);
        next.handle(Event::Install).await.unwrap();
        *registration.waiting.write().await = Some(Arc::new(next));

        let outcome = registration
            .dispatch(Event::Message(MessageEvent::new(json!({"type": "SKIP_WAITING"}))))
            .await
            .unwrap();

        assert!(outcome.has_effect(&Effect::Claim));
        assert!(registration.waiting().await.is_none());
        assert_eq!(registration.active().await.unwrap().epoch().version(), "2");
    }

    #[tokio::test]
    async fn test_revalidation_in_flight_does_not_revive_old_store() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let registration = Registration::new();
        registration
            .update(engine_with(versioned("1", &[]), db.clone(), network.clone()))
            .await
            .unwrap();

        let request = Request::get(url("https://app.test/logo.png"));
        db.put_entry("test-static-v1", &request, &Response::ok("v1 logo")).await.unwrap();
        let gate = network.gate("https://app.test/logo.png", Response::ok("fresh logo"));
        assert!(registration.fetch(request).await.unwrap().is_some());

        let release = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            gate.notify_one();
        });
        registration
            .update(engine_with(versioned("2", &[]), db.clone(), network))
            .await
            .unwrap();
        release.await.unwrap();

        assert_eq!(db.list_stores().await.unwrap(), vec!["test-static-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_waiting_without_waiting_engine() {
        let registration = Registration::new();
        assert!(registration.skip_waiting().await.unwrap().is_empty());
    }
}
