//! Fetch dispatch and the two caching strategies.

use super::{Engine, fetch_with_timeout};
use crate::Outcome;
use crate::fetch::resolve;
use swcache_core::offline::{offline_page, service_unavailable};
use swcache_core::{CachedEntry, Error, Request, Response, Route, Strategy, WorkerState};

impl Engine {
    pub(super) async fn on_fetch(&self, request: Request) -> Result<Outcome, Error> {
        if !self.state().await.can_intercept() {
            return Ok(Outcome::pass_through());
        }

        let strategy = match self.routes.classify(&request) {
            Route::PassThrough => {
                tracing::trace!(method = %request.method, url = %request.url, "pass through");
                return Ok(Outcome::pass_through());
            }
            Route::Intercept(strategy) => strategy,
        };

        let result = match strategy {
            Strategy::CacheFirst => self.cache_first(&request).await,
            Strategy::NetworkFirst => self.network_first(&request).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(Error::FetchTooLarge(reason)) => {
                tracing::debug!(url = %request.url, reason = %reason, "too large to buffer, passing through");
                return Ok(Outcome::pass_through());
            }
            Err(e) => self.recover(&request, &e).await,
        };
        Ok(Outcome::respond(response))
    }

    /// Serve from the current stores, refreshing the entry in the background.
    async fn cache_first(&self, request: &Request) -> Result<Response, Error> {
        if let Some(hit) = self.lookup(request).await {
            tracing::debug!(url = %request.url, store = %hit.store, "cache hit");
            self.spawn_revalidate(hit.store, request.clone());
            return Ok(hit.response);
        }

        let response = self.fetch_network(request).await?;
        if response.is_success() {
            self.store(&self.epoch.dynamic_store(), request, &response).await;
        }
        Ok(response)
    }

    /// Prefer the network; fall back to the stored entry on fetch failure.
    ///
    /// A navigation without a stored entry surfaces the error so `recover`
    /// can answer with the offline page.
    async fn network_first(&self, request: &Request) -> Result<Response, Error> {
        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store(&self.epoch.dynamic_store(), request, &response).await;
                }
                Ok(response)
            }
            Err(e) if e.is_fetch_failure() => {
                tracing::debug!(url = %request.url, error = %e, "network failed, trying cache");
                match self.lookup(request).await {
                    Some(hit) => Ok(hit.response),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Turn a dispatch failure into something the page can render.
    async fn recover(&self, request: &Request, error: &Error) -> Response {
        tracing::warn!(url = %request.url, error = %error, "request failed");

        if !request.is_navigation() {
            return service_unavailable(self.config.unavailable_status);
        }

        if let Some(fallback) = &self.config.offline_fallback {
            match resolve(self.routes.origin(), fallback) {
                Ok(url) => {
                    if let Some(hit) = self.lookup(&Request::get(url)).await {
                        return hit.response;
                    }
                }
                Err(e) => tracing::warn!(fallback = %fallback, error = %e, "bad offline fallback"),
            }
        }

        offline_page(&self.config.app_name)
    }

    /// Look `request` up in the current epoch's stores.
    ///
    /// A failing store read counts as a miss.
    pub(super) async fn lookup(&self, request: &Request) -> Option<CachedEntry> {
        match self.db.match_entry(&self.epoch.whitelist(), request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Write a response; failures are logged and the response is still served.
    ///
    /// A retired engine writes nothing, so its epoch's stores stay deleted.
    pub(super) async fn store(&self, store: &str, request: &Request, response: &Response) {
        if self.state().await == WorkerState::Redundant {
            tracing::debug!(url = %request.url, store, "engine retired, not storing");
            return;
        }
        if let Err(e) = self.db.put_entry(store, request, response).await {
            tracing::warn!(url = %request.url, store, error = %e, "cache write failed");
        }
    }

    fn spawn_revalidate(&self, store: String, request: Request) {
        let db = self.db.clone();
        let network = self.network.clone();
        let state = self.state.clone();
        let timeout = self.config.timeout();

        self.tasks.spawn(async move {
            match fetch_with_timeout(network.as_ref(), timeout, &request).await {
                Ok(_) if *state.read().await == WorkerState::Redundant => {
                    tracing::debug!(url = %request.url, "engine retired, revalidation dropped");
                }
                Ok(response) if response.is_success() => {
                    if let Err(e) = db.put_entry(&store, &request, &response).await {
                        tracing::warn!(url = %request.url, error = %e, "revalidation write failed");
                    } else {
                        tracing::debug!(url = %request.url, store = %store, "revalidated");
                    }
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "revalidation not stored");
                }
                Err(e) => tracing::debug!(url = %request.url, error = %e, "revalidation failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::testing::{ScriptedNetwork, active_engine, engine_with, test_config, url};
    use crate::Event;
    use swcache_core::{AppConfig, CacheDb, Request, Response};

    fn body(response: &Response) -> String {
        String::from_utf8(response.body.to_vec()).unwrap()
    }

    async fn fetch(engine: &crate::Engine, request: Request) -> Option<Response> {
        engine.handle(Event::Fetch(request)).await.unwrap().response
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db, network.clone()).await;

        let request = Request::new("POST", url("https://app.test/api/items")).with_body("{}");
        assert!(fetch(&engine, request).await.is_none());
        assert_eq!(network.calls("https://app.test/api/items"), 0);
    }

    #[tokio::test]
    async fn test_excluded_media_is_not_intercepted_or_stored() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://app.test/intro.mp4", Response::ok("video"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), network.clone()).await;

        assert!(fetch(&engine, Request::get(url("https://app.test/intro.mp4"))).await.is_none());
        assert!(fetch(&engine, Request::get(url("https://www.youtube.com/embed/x"))).await.is_none());
        assert_eq!(network.calls("https://app.test/intro.mp4"), 0);
        assert_eq!(db.count_entries("test-dynamic-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inactive_engine_does_not_intercept() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = engine_with(test_config(), db, Arc::new(ScriptedNetwork::new()));
        assert!(fetch(&engine, Request::get(url("https://app.test/app.js"))).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://app.test/app.js", Response::ok("console.log(1)"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), network.clone()).await;

        let response = fetch(&engine, Request::get(url("https://app.test/app.js"))).await.unwrap();
        assert_eq!(body(&response), "console.log(1)");
        assert_eq!(db.count_entries("test-dynamic-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_errors() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://app.test/gone.css", Response::new(404, "nope"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), network).await;

        let response = fetch(&engine, Request::get(url("https://app.test/gone.css"))).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(db.count_entries("test-dynamic-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_hit_does_not_wait_for_revalidation() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = AppConfig { timeout_ms: 5_000, ..test_config() };
        let engine = active_engine(config, db.clone(), network.clone()).await;

        let request = Request::get(url("https://app.test/logo.png"));
        db.put_entry("test-static-v1", &request, &Response::ok("png-bytes")).await.unwrap();
        network.hang("https://app.test/logo.png");

        let response = tokio::time::timeout(Duration::from_millis(500), fetch(&engine, request))
            .await
            .expect("cache hit must not wait on the network")
            .unwrap();
        assert_eq!(body(&response), "png-bytes");
    }

    #[tokio::test]
    async fn test_cache_first_hit_revalidates_in_background() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), network.clone()).await;

        let request = Request::get(url("https://app.test/style.css"));
        db.put_entry("test-static-v1", &request, &Response::ok("old")).await.unwrap();
        network.respond("https://app.test/style.css", Response::ok("new"));

        let first = fetch(&engine, request.clone()).await.unwrap();
        assert_eq!(body(&first), "old");

        engine.settle().await;
        let stored = db.match_entry(&["test-static-v1".to_string()], &request).await.unwrap().unwrap();
        assert_eq!(body(&stored.response), "new");
    }

    #[tokio::test]
    async fn test_revalidation_failure_keeps_entry() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), network.clone()).await;

        let request = Request::get(url("https://app.test/style.css"));
        db.put_entry("test-static-v1", &request, &Response::ok("old")).await.unwrap();
        network.fail("https://app.test/style.css");

        fetch(&engine, request.clone()).await.unwrap();
        engine.settle().await;
        let stored = db.match_entry(&["test-static-v1".to_string()], &request).await.unwrap().unwrap();
        assert_eq!(body(&stored.response), "old");
    }

    #[tokio::test]
    async fn test_network_first_offline_serves_stored_entry() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://app.test/api/feed", Response::ok("fresh"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db, network.clone()).await;

        let request = Request::get(url("https://app.test/api/feed"));
        assert_eq!(body(&fetch(&engine, request.clone()).await.unwrap()), "fresh");

        network.set_offline(true);
        let response = fetch(&engine, request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(body(&response), "fresh");
    }

    #[tokio::test]
    async fn test_network_first_timeout_falls_back() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), network.clone()).await;

        let request = Request::get(url("https://app.test/api/slow"));
        db.put_entry("test-dynamic-v1", &request, &Response::ok("stale")).await.unwrap();
        network.hang("https://app.test/api/slow");

        let response = fetch(&engine, request).await.unwrap();
        assert_eq!(body(&response), "stale");
    }

    #[tokio::test]
    async fn test_navigation_miss_offline_gets_offline_page() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db, network.clone()).await;
        network.set_offline(true);

        let response = fetch(&engine, Request::navigate(url("https://app.test/about"))).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(body(&response).contains("Offline"));
        assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(response.header("cache-control"), Some("no-cache"));
    }

    #[tokio::test]
    async fn test_navigation_uses_cached_offline_fallback() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = AppConfig { offline_fallback: Some("/".into()), ..test_config() };
        let engine = active_engine(config, db.clone(), network.clone()).await;
        db.put_entry("test-static-v1", &Request::get(url("https://app.test/")), &Response::ok("<html>shell</html>"))
            .await
            .unwrap();
        network.set_offline(true);

        let response = fetch(&engine, Request::navigate(url("https://app.test/api/page"))).await.unwrap();
        assert_eq!(body(&response), "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_oversized_response_passes_through_unstored() {
        let network = Arc::new(ScriptedNetwork::new());
        network.too_large("https://app.test/big.png");
        network.too_large("https://app.test/api/export");
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), network).await;

        assert!(fetch(&engine, Request::get(url("https://app.test/big.png"))).await.is_none());
        assert!(fetch(&engine, Request::navigate(url("https://app.test/api/export"))).await.is_none());
        assert_eq!(db.count_entries("test-dynamic-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retired_engine_does_not_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db.clone(), Arc::new(ScriptedNetwork::new())).await;
        engine.retire().await;

        let request = Request::get(url("https://app.test/late.js"));
        engine.store("test-dynamic-v1", &request, &Response::ok("late")).await;
        assert_eq!(db.count_entries("test-dynamic-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_subresource_miss_offline_gets_unavailable() {
        let network = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let engine = active_engine(test_config(), db, network.clone()).await;
        network.set_offline(true);

        let response = fetch(&engine, Request::get(url("https://app.test/api/data"))).await.unwrap();
        assert_eq!(response.status, 503);
    }
}
