//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Named cache stores with a SQLite backend
//! - Unified error types
//! - Configuration structures
//! - Request/response values, route classification and control messages

pub mod cache;
pub mod config;
pub mod epoch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod message;
pub mod offline;
pub mod push;
pub mod routes;

pub use cache::{CacheDb, CachedEntry, EntryMeta};
pub use config::{AppConfig, ConfigError};
pub use epoch::Epoch;
pub use error::Error;
pub use http::{Request, RequestMode, Response};
pub use lifecycle::WorkerState;
pub use message::{Broadcast, CacheSummary, ControlMessage, Reply};
pub use push::{Notification, NotificationDefaults, PushPayload};
pub use routes::{Route, RouteTable, RoutesFile, Strategy};
