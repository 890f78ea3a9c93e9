//! HTTP fetch pipeline backed by reqwest.
//!
//! ### Behaviour
//! - Any HTTP status is returned as a response; only transport failures are errors
//! - Request timeout and max body bytes are configurable
//! - Hop-by-hop headers are never forwarded or stored
//!
//! Pass-through traffic uses [`FetchClient::forward`], which hands back the
//! raw reqwest response so the host can stream large bodies.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, resolve};

use crate::Network;
use swcache_core::{AppConfig, Error, Request, Response};

/// Headers that describe one connection rather than the resource.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes for buffered fetches (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP client used as the engine's network.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Send `request` and return the unbuffered response.
    pub async fn forward(&self, request: &Request) -> Result<reqwest::Response, Error> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        // reqwest negotiates compression itself and hands back decoded bodies.
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) && !name.eq_ignore_ascii_case("accept-encoding") {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{} after {:?}", request.url, self.config.timeout))
            } else {
                Error::Network(format!("{}: {e}", request.url))
            }
        })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let response = self.forward(request).await?;
        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let headers = collect_headers(response.headers());

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("reading {}: {e}", request.url))
            } else {
                Error::Network(format!("failed to read response: {e}"))
            }
        })?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response { status: status.as_u16(), headers, body: bytes })
    }
}

/// Copy end-to-end headers; values that are not valid UTF-8 are dropped.
pub fn collect_headers(map: &header::HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect()
}
