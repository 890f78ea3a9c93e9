//! Page-side controller: talks to a running host over HTTP.
//!
//! Holds no caching logic of its own. Every command is a message or a health check
//! against the host's `/__sw/*` endpoints.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use serde_json::{Value, json};
use url::Url;

use swcache_core::{Broadcast, Reply};

use crate::sse::{SseMessage, SseParser};

pub struct Controller {
    http: reqwest::Client,
    base: Url,
}

/// What the health check saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    Online { version: Option<String>, state: Option<String> },
    Offline(String),
}

impl Controller {
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("bad host URL {}", self.base))
    }

    /// Post a control message and decode the reply, if any.
    pub async fn send(&self, message_type: &str) -> Result<Option<Reply>> {
        let response = self
            .http
            .post(self.endpoint("/__sw/message")?)
            .json(&json!({ "type": message_type }))
            .send()
            .await
            .context("sending message to host")?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await.context("decoding reply")?)),
            status => bail!("host answered {status}: {}", response.text().await.unwrap_or_default()),
        }
    }

    /// Register this page; the same id always maps to the same client.
    pub async fn register(&self, id: Option<&str>, url: &str) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint("/__sw/clients")?)
            .json(&json!({ "id": id, "url": url }))
            .send()
            .await
            .context("registering client")?
            .error_for_status()?;
        let body: Value = response.json().await?;
        body["id"]
            .as_str()
            .map(str::to_string)
            .context("host reply has no client id")
    }

    pub async fn check_health(&self) -> Connectivity {
        let result = async {
            let response = self
                .http
                .get(self.endpoint("/__sw/health")?)
                .send()
                .await?
                .error_for_status()?;
            Ok::<Value, anyhow::Error>(response.json().await?)
        }
        .await;

        match result {
            Ok(body) => Connectivity::Online {
                version: body["version"].as_str().map(str::to_string),
                state: body["state"].as_str().map(str::to_string),
            },
            Err(e) => Connectivity::Offline(e.to_string()),
        }
    }

    /// Follow the host's event stream, calling `on_event` for each event.
    pub async fn watch(&self, mut on_event: impl FnMut(SseMessage)) -> Result<()> {
        let mut response = self
            .http
            .get(self.endpoint("/__sw/events")?)
            .timeout(Duration::from_secs(60 * 60 * 24 * 365))
            .send()
            .await
            .context("connecting to event stream")?
            .error_for_status()?;

        let mut parser = SseParser::new();
        while let Some(chunk) = response.chunk().await? {
            for event in parser.push(&chunk) {
                on_event(event);
            }
        }
        tracing::debug!("event stream closed");
        Ok(())
    }
}

/// Human-readable rendering of a reply.
pub fn describe_reply(reply: &Reply) -> String {
    match reply {
        Reply::VersionInfo { version, app_name, cache_name } => {
            format!("{app_name} version {version} (cache {cache_name})")
        }
        Reply::CacheInfo { caches, total } | Reply::CacheStatus { caches, total } => {
            let mut lines: Vec<String> = caches
                .iter()
                .map(|c| format!("{:<40} {:>6}", c.name, c.size))
                .collect();
            lines.push(format!("{:<40} {:>6}", "total", total));
            lines.join("\n")
        }
        Reply::CacheCleared => "all caches cleared".to_string(),
    }
}

/// Render one streamed event; activation turns into an update notice.
pub fn describe_event(event: &SseMessage) -> String {
    if event.event == "message"
        && let Ok(Broadcast::SwActivated { version, .. }) = serde_json::from_str::<Broadcast>(&event.data)
    {
        return format!("A new version ({version}) is available. Reload to update.");
    }
    format!("[{}] {}", event.event, event.data)
}
