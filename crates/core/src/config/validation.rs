//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `version` or `app_name` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `cache_prefix` is empty or contains whitespace
    /// - `origin` is not an http(s) URL
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `retention_days` is 0 or `sweep_interval_secs` is under a minute
    /// - `unavailable_status` is not a 5xx code
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Missing { field: "version".into(), hint: "Set SWCACHE_VERSION".into() });
        }
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::Missing { field: "app_name".into(), hint: "Set SWCACHE_APP_NAME".into() });
        }

        if self.cache_prefix.is_empty() || self.cache_prefix.chars().any(char::is_whitespace) {
            return Err(invalid("cache_prefix", "must be non-empty without whitespace"));
        }

        self.origin_url()?;

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.retention_days == 0 {
            return Err(invalid("retention_days", "must be at least 1"));
        }
        if self.sweep_interval_secs < 60 {
            return Err(invalid("sweep_interval_secs", "must be at least 60"));
        }

        if !(500..=599).contains(&self.unavailable_status) {
            return Err(invalid("unavailable_status", "must be a 5xx status code"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.precache.is_empty() {
            tracing::warn!("precache manifest is empty; install will create an empty static store");
        }

        Ok(())
    }
}
