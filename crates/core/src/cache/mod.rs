//! SQLite-backed named cache stores.
//!
//! This module provides persistent request→response stores using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Multiple named stores, created on first write and deleted wholesale
//! - Request identity keyed by SHA-256 of method and canonical URL
//! - Atomic multi-entry writes for install-time population
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CachedEntry, EntryMeta};
