//! Cache policy engine for swcache.
//!
//! This crate provides the network fetch pipeline, the event-driven engine
//! that decides per request between cache and network, and the registration
//! that moves engines through their install/activate lifecycle.

pub mod event;
pub mod fetch;
pub mod network;
pub mod registration;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use event::{ClientInfo, Effect, Event, MessageEvent, NotificationClick, Outcome};
pub use fetch::{FetchClient, FetchConfig};
pub use network::Network;
pub use registration::Registration;
pub use worker::{Engine, PERIODIC_REFRESH_TAG, PRECACHE_SYNC_TAG};
