//! Test doubles shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{Engine, Event, Network};
use swcache_core::{AppConfig, CacheDb, Error, Request, Response};

#[derive(Clone)]
enum Script {
    Respond(Response),
    Fail,
    Hang,
    TooLarge,
    /// Respond once the gate is opened.
    Gated(Arc<Notify>, Response),
}

/// In-process network answering from a per-URL script.
///
/// Unscripted URLs answer 404.
#[derive(Default)]
pub struct ScriptedNetwork {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.scripts.lock().unwrap().insert(url.to_string(), Script::Respond(response));
    }

    pub fn fail(&self, url: &str) {
        self.scripts.lock().unwrap().insert(url.to_string(), Script::Fail);
    }

    /// The fetch never completes.
    pub fn hang(&self, url: &str) {
        self.scripts.lock().unwrap().insert(url.to_string(), Script::Hang);
    }

    /// The origin answers with a body over the size cap.
    pub fn too_large(&self, url: &str) {
        self.scripts.lock().unwrap().insert(url.to_string(), Script::TooLarge);
    }

    /// Hold the fetch until the returned gate is notified.
    pub fn gate(&self, url: &str, response: Response) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Gated(gate.clone(), response));
        gate
    }

    /// Fail every fetch regardless of script.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{url}: offline")));
        }

        let script = self.scripts.lock().unwrap().get(&url).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail) => Err(Error::Network(format!("{url}: connection reset"))),
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::TooLarge) => Err(Error::FetchTooLarge(format!("{url}: body over cap"))),
            Some(Script::Gated(gate, response)) => {
                gate.notified().await;
                Ok(response)
            }
            None => Ok(Response::new(404, "not found")),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        app_name: "Test App".into(),
        version: "1".into(),
        cache_prefix: "test".into(),
        origin: "https://app.test".into(),
        precache: Vec::new(),
        timeout_ms: 200,
        ..Default::default()
    }
}

pub fn engine_with(config: AppConfig, db: CacheDb, network: Arc<ScriptedNetwork>) -> Engine {
    Engine::new(config, db, network).unwrap()
}

/// An engine that has installed (with an empty manifest) and activated.
pub async fn active_engine(config: AppConfig, db: CacheDb, network: Arc<ScriptedNetwork>) -> Engine {
    let engine = engine_with(AppConfig { precache: Vec::new(), ..config }, db, network);
    engine.handle(Event::Install).await.unwrap();
    engine.handle(Event::Activate).await.unwrap();
    engine
}

pub fn url(s: &str) -> url::Url {
    url::Url::parse(s).unwrap()
}
