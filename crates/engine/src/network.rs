//! The network seam.
//!
//! The engine only sees this trait, so tests drive it with a scripted
//! implementation and the host plugs in [`crate::FetchClient`].

use async_trait::async_trait;
use swcache_core::{Error, Request, Response};

/// Something that can perform a request over the network.
///
/// Implementations return `Ok` for any HTTP status, including errors;
/// `Err` means the request never produced a response.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
