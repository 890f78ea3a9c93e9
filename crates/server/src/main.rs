//! swcache host entry point.
//!
//! Boots an offline-first caching proxy in front of the configured origin.
//! Logging goes to stderr as JSON lines.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::EnvFilter;

use swcache_core::{AppConfig, CacheDb};

mod error;
mod host;
mod routes;

#[cfg(test)]
mod testing;

use host::Host;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        origin = %config.origin,
        bind = %config.bind_addr,
        version = %config.version,
        "starting swcache host"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let host = Arc::new(Host::new(config.clone(), db)?);

    // Without an active engine every request passes through to the origin.
    if let Err(e) = host.install_current().await {
        tracing::error!(error = %e, "initial install failed, proxying without cache");
    }

    let shutdown = CancellationToken::new();
    let tasks = TaskTracker::new();
    tasks.spawn(host.clone().run_sweeps(config.sweep_interval(), shutdown.clone()));
    tasks.spawn(wait_for_ctrl_c(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, routes::router(host.clone()))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    tasks.close();
    tasks.wait().await;
    host.drain().await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "could not listen for ctrl-c");
            }
            tracing::info!("shutting down");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}
