//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Epoch, NotificationDefaults};

mod validation;

pub use validation::ConfigError;

/// Engine and host configuration.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Human-readable application name, used in replies and notifications.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Deployed version. Embedded in store names; changing it starts a new epoch.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix of every store name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Origin server the proxy fronts.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Address the host listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Paths fetched and stored at install time, resolved against `origin`.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Cached page served to failed navigations before the synthesized one.
    #[serde(default)]
    pub offline_fallback: Option<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Entries whose `Date` header is older than this are swept.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Seconds between periodic sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Status code of the minimal response for failed non-navigations.
    #[serde(default = "default_unavailable_status")]
    pub unavailable_status: u16,

    /// TOML file with exclusions and route rules; built-in table when unset.
    #[serde(default)]
    pub routes_file: Option<PathBuf>,

    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,

    #[serde(default = "default_notification_tag")]
    pub notification_tag: String,

    /// Page opened by notification clicks without a target URL.
    #[serde(default = "default_start_url")]
    pub start_url: String,
}

fn default_app_name() -> String {
    "swcache".into()
}

fn default_version() -> String {
    "1".into()
}

fn default_cache_prefix() -> String {
    "swcache".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_precache() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into(), "/favicon.ico".into()]
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_retention_days() -> u32 {
    7
}

fn default_sweep_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_unavailable_status() -> u16 {
    503
}

fn default_notification_icon() -> String {
    "/icons/icon-192.png".into()
}

fn default_notification_badge() -> String {
    "/favicon.ico".into()
}

fn default_notification_tag() -> String {
    "swcache-notification".into()
}

fn default_start_url() -> String {
    "/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            precache: default_precache(),
            offline_fallback: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            retention_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            unavailable_status: default_unavailable_status(),
            routes_file: None,
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
            notification_tag: default_notification_tag(),
            start_url: default_start_url(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// The epoch this configuration deploys.
    pub fn epoch(&self) -> Epoch {
        Epoch::new(&self.cache_prefix, &self.version)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme {scheme}"),
            }),
        }
    }

    pub fn notification_defaults(&self) -> NotificationDefaults {
        NotificationDefaults {
            app_name: self.app_name.clone(),
            icon: self.notification_icon.clone(),
            badge: self.notification_badge.clone(),
            tag: self.notification_tag.clone(),
            start_url: self.start_url.clone(),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
