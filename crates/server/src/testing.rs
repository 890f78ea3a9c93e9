//! Local origin server and config helpers for host tests.

use axum::Router;
use axum::body::Bytes;
use axum::response::Html;
use axum::routing::{get, post};
use url::Url;

use swcache_core::AppConfig;

/// Serve a tiny static site on an ephemeral port and return its URL.
pub async fn spawn_origin() -> Url {
    let app = Router::new()
        .route("/", get(|| async { Html("<html><body>home</body></html>") }))
        .route("/inbox", get(|| async { Html("<html><body>inbox</body></html>") }))
        .route("/app.js", get(|| async { ([("content-type", "text/javascript")], "console.log('v1')") }))
        .route("/big.png", get(|| async { ([("content-type", "image/png")], vec![0u8; 4096]) }))
        .route("/echo", post(|body: Bytes| async move { body }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

pub fn test_config(origin: &Url, version: &str) -> AppConfig {
    AppConfig {
        app_name: "Test App".into(),
        version: version.into(),
        cache_prefix: "test".into(),
        origin: origin.to_string(),
        precache: vec!["/".into()],
        timeout_ms: 2_000,
        ..Default::default()
    }
}
