//! The cache policy engine.
//!
//! One [`Engine`] serves one epoch. Events are routed through
//! [`Engine::handle`], which dispatches by kind to the handlers in the
//! submodules. Handlers return an [`Outcome`]; they never touch pages.

mod activate;
mod fetch;
mod install;
mod message;
mod notify;
mod sweep;
mod sync;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;

use crate::{Event, Network, Outcome};
use swcache_core::{AppConfig, CacheDb, Epoch, Error, Request, Response, RouteTable, RoutesFile, WorkerState};

pub use sync::{PERIODIC_REFRESH_TAG, PRECACHE_SYNC_TAG};

pub struct Engine {
    config: AppConfig,
    epoch: Epoch,
    routes: RouteTable,
    db: CacheDb,
    network: Arc<dyn Network>,
    state: Arc<RwLock<WorkerState>>,
    /// Detached work such as revalidation.
    tasks: TaskTracker,
}

impl Engine {
    /// Build an engine for the epoch named by `config`.
    ///
    /// The routes file, when configured, is loaded here so a bad rule fails
    /// before any event is handled.
    pub fn new(config: AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let file = match &config.routes_file {
            Some(path) => RoutesFile::load(path)?,
            None => RoutesFile::default(),
        };
        let routes = RouteTable::new(origin, file)?;

        Ok(Self {
            epoch: config.epoch(),
            config,
            routes,
            db,
            network,
            state: Arc::new(RwLock::new(WorkerState::Installing)),
            tasks: TaskTracker::new(),
        })
    }

    /// Route one event to its handler.
    pub async fn handle(&self, event: Event) -> Result<Outcome, Error> {
        tracing::trace!(kind = event.kind(), version = self.epoch.version(), "event");
        match event {
            Event::Install => self.install().await,
            Event::Activate => self.activate().await,
            Event::Fetch(request) => self.on_fetch(request).await,
            Event::Message(message) => self.on_message(message).await,
            Event::Push(data) => Ok(self.on_push(&data)),
            Event::NotificationClick(click) => Ok(self.on_notification_click(click)),
            Event::PeriodicSync(tag) => Ok(self.on_periodic_sync(&tag).await),
            Event::Sync(tag) => Ok(self.on_sync(&tag).await),
        }
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    /// Mark this engine superseded. Already-redundant engines stay so.
    pub async fn retire(&self) {
        let mut state = self.state.write().await;
        if *state != WorkerState::Redundant {
            *state = WorkerState::Redundant;
            tracing::info!(version = self.epoch.version(), "engine retired");
        }
    }

    /// Wait for every detached task spawned so far.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    async fn transition(&self, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        *state = state.transition(to)?;
        tracing::debug!(version = self.epoch.version(), state = %to, "state changed");
        Ok(())
    }

    async fn fetch_network(&self, request: &Request) -> Result<Response, Error> {
        fetch_with_timeout(self.network.as_ref(), self.config.timeout(), request).await
    }
}

/// Fetch with a hard deadline on top of whatever the network enforces.
async fn fetch_with_timeout(network: &dyn Network, timeout: Duration, request: &Request) -> Result<Response, Error> {
    match tokio::time::timeout(timeout, network.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::FetchTimeout(format!("{} after {timeout:?}", request.url))),
    }
}
