//! The host: owns the registration and applies engine effects.
//!
//! Pages are tracked in a small client registry. Effects that target pages
//! (broadcasts, notifications, focus/open requests) are published on a
//! broadcast channel that the SSE endpoint streams out.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use url::Url;

use swcache_core::{AppConfig, CacheDb, Error, WorkerState};
use swcache_engine::{ClientInfo, Effect, Engine, Event, FetchClient, FetchConfig, Network, Outcome, Registration};

const EVENT_BUFFER: usize = 64;

/// A page-facing event, sent over SSE as `event: <name>` / `data: <json>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostEvent {
    pub name: &'static str,
    pub data: Value,
}

#[derive(Debug, Clone)]
struct ClientRecord {
    info: ClientInfo,
    /// Version of the engine controlling this page, once claimed.
    controller: Option<String>,
}

/// Result of a configuration reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub updated: bool,
    pub version: String,
}

pub struct Host {
    registration: Registration,
    db: CacheDb,
    network: Arc<FetchClient>,
    origin: Url,
    config: RwLock<AppConfig>,
    clients: RwLock<HashMap<String, ClientRecord>>,
    events: broadcast::Sender<HostEvent>,
}

impl Host {
    pub fn new(config: AppConfig, db: CacheDb) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Ok(Self {
            registration: Registration::new(),
            db,
            network,
            origin,
            config: RwLock::new(config),
            clients: RwLock::new(HashMap::new()),
            events,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn network(&self) -> &FetchClient {
        &self.network
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    /// Install and activate the engine for the loaded configuration.
    pub async fn install_current(&self) -> Result<(), Error> {
        let config = self.config.read().await.clone();
        let effects = self.registration.update(self.engine_for(config)?).await?;
        self.apply(effects).await;
        Ok(())
    }

    /// Swap in `config`, deploying a new epoch if its version changed.
    ///
    /// A failed install leaves the previous configuration and engine in place.
    pub async fn update_with(&self, config: AppConfig) -> Result<UpdateReport, Error> {
        let active_version = self.active_version().await;
        if active_version.as_deref() == Some(config.version.as_str()) {
            return Ok(UpdateReport { updated: false, version: config.version });
        }

        let version = config.version.clone();
        let effects = self
            .registration
            .update(self.engine_for(config.clone())?)
            .await?;
        *self.config.write().await = config;
        self.apply(effects).await;

        tracing::info!(version = %version, previous = ?active_version, "deployed new version");
        Ok(UpdateReport { updated: true, version })
    }

    /// Dispatch an event and apply whatever effects come back.
    pub async fn dispatch(&self, event: Event) -> Result<Outcome, Error> {
        let outcome = self.registration.dispatch(event).await?;
        self.apply(outcome.effects.clone()).await;
        Ok(outcome)
    }

    pub async fn active_version(&self) -> Option<String> {
        let engine = self.registration.active().await?;
        Some(engine.epoch().version().to_string())
    }

    pub async fn active_state(&self) -> Option<WorkerState> {
        let engine = self.registration.active().await?;
        Some(engine.state().await)
    }

    /// Register a page, or update its URL when the id is already known.
    pub async fn register_client(&self, id: Option<String>, url: String) -> ClientInfo {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let controller = self.active_version().await;

        let mut clients = self.clients.write().await;
        let record = clients.entry(id.clone()).or_insert_with(|| ClientRecord {
            info: ClientInfo { id: id.clone(), url: url.clone() },
            controller,
        });
        record.info.url = url;
        tracing::debug!(client = %id, url = %record.info.url, "client registered");
        record.info.clone()
    }

    pub async fn clients(&self) -> Vec<ClientInfo> {
        self.clients
            .read()
            .await
            .values()
            .map(|record| record.info.clone())
            .collect()
    }

    pub async fn controller_of(&self, id: &str) -> Option<String> {
        self.clients.read().await.get(id)?.controller.clone()
    }

    /// Run one sweep through the active engine.
    pub async fn sweep(&self) -> Result<u64, Error> {
        match self.registration.active().await {
            Some(engine) => engine.sweep().await,
            None => Ok(0),
        }
    }

    /// Sweep on a fixed interval until `shutdown` fires.
    pub async fn run_sweeps(self: Arc<Self>, every: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::warn!(error = %e, "sweep failed");
                    }
                }
            }
        }
        tracing::debug!("sweep loop stopped");
    }

    /// Wait for background revalidations of the active engine.
    pub async fn drain(&self) {
        if let Some(engine) = self.registration.active().await {
            engine.settle().await;
        }
    }

    fn engine_for(&self, config: AppConfig) -> Result<Engine, Error> {
        let network: Arc<dyn Network> = self.network.clone();
        Engine::new(config, self.db.clone(), network)
    }

    async fn apply(&self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::SkipWaiting => match self.registration.skip_waiting().await {
                    Ok(more) => queue.extend(more),
                    Err(e) => tracing::warn!(error = %e, "skip waiting failed"),
                },
                Effect::Claim => self.claim().await,
                Effect::Broadcast(message) => self.emit("message", serde_json::to_value(message)),
                Effect::ShowNotification(notification) => {
                    self.emit("notification", serde_json::to_value(notification))
                }
                Effect::FocusClient(id) => self.emit("focus", Ok(json!({ "client": id }))),
                Effect::OpenWindow(url) => self.emit("open", Ok(json!({ "url": url }))),
            }
        }
    }

    async fn claim(&self) {
        let Some(version) = self.active_version().await else { return };
        let mut clients = self.clients.write().await;
        for record in clients.values_mut() {
            record.controller = Some(version.clone());
        }
        tracing::debug!(version = %version, clients = clients.len(), "claimed clients");
    }

    fn emit(&self, name: &'static str, data: Result<Value, serde_json::Error>) {
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(event = name, error = %e, "could not encode event");
                return;
            }
        };
        if self.events.send(HostEvent { name, data }).is_err() {
            tracing::trace!(event = name, "no listeners");
        }
    }
}
