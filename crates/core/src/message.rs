//! Control messages between pages and the engine.
//!
//! Wire shapes are JSON objects discriminated by a `type` field.

use serde::{Deserialize, Serialize};

/// Messages a page may post to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    ClearCache,
    GetCacheInfo,
    GetCacheStatus,
    CheckVersion,
}

impl ControlMessage {
    /// Decode a posted value; anything unrecognised is `None` and ignored.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Entry count for one named store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub name: String,
    pub size: u64,
}

/// Replies delivered over a message's reply port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    VersionInfo {
        version: String,
        #[serde(rename = "appName")]
        app_name: String,
        #[serde(rename = "cacheName")]
        cache_name: String,
    },
    CacheInfo {
        caches: Vec<CacheSummary>,
        total: u64,
    },
    CacheStatus {
        caches: Vec<CacheSummary>,
        total: u64,
    },
    CacheCleared,
}

/// Messages the engine sends to every open page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Broadcast {
    SwActivated {
        version: String,
        #[serde(rename = "cacheName")]
        cache_name: String,
    },
}
