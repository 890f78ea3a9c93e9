//! HTTP surface of the host.
//!
//! `/__sw/*` carries the control endpoints. Every other path is proxied: it
//! is mapped onto the origin, offered to the engine as a fetch event, and
//! forwarded untouched when the engine passes.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request as HttpRequest, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::error::HostError;
use crate::host::Host;
use swcache_core::{AppConfig, Request, RequestMode, Response};
use swcache_engine::fetch::collect_headers;
use swcache_engine::{Effect, Event, MessageEvent, NotificationClick};

/// Largest request body accepted for forwarding.
const MAX_REQUEST_BODY: usize = 10 * 1024 * 1024;

pub fn router(host: Arc<Host>) -> Router {
    Router::new()
        .route("/__sw/message", post(post_message))
        .route("/__sw/push", post(post_push))
        .route("/__sw/notificationclick", post(post_notification_click))
        .route("/__sw/sync", post(post_sync))
        .route("/__sw/clients", post(post_client).get(list_clients))
        .route("/__sw/events", get(events))
        .route("/__sw/update", post(post_update))
        .route("/__sw/health", get(health))
        .route("/__sw/{*rest}", any(unknown_control))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(host)
}

async fn proxy(State(host): State<Arc<Host>>, request: HttpRequest) -> Result<HttpResponse, HostError> {
    let request = to_engine_request(&host, request).await?;

    match host.dispatch(Event::Fetch(request.clone())).await?.response {
        Some(response) => Ok(from_engine_response(response)),
        None => forward(&host, &request).await,
    }
}

/// Pass-through: stream the origin's answer back without buffering it.
async fn forward(host: &Host, request: &Request) -> Result<HttpResponse, HostError> {
    let upstream = host
        .network()
        .forward(request)
        .await
        .map_err(|e| HostError::BadGateway(e.to_string()))?;

    let status = upstream.status();
    let headers = collect_headers(upstream.headers());
    let mut response = HttpResponse::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    copy_headers(response.headers_mut(), headers);
    Ok(response)
}

async fn to_engine_request(host: &Host, request: HttpRequest) -> Result<Request, HostError> {
    let (parts, body) = request.into_parts();
    let url = origin_url(host.origin(), &parts.uri);
    let body = axum::body::to_bytes(body, MAX_REQUEST_BODY)
        .await
        .map_err(|e| HostError::InvalidInput(format!("request body: {e}")))?;

    let mut request = Request::new(parts.method.as_str(), url).with_body(body);
    request.mode = RequestMode::from_fetch_mode(
        parts
            .headers
            .get("sec-fetch-mode")
            .and_then(|v| v.to_str().ok()),
    );
    request.headers = collect_headers(&parts.headers);
    Ok(request)
}

/// Map a request target onto the origin.
///
/// Path and query replace the origin's own, so a target such as
/// `//other.host/x` stays a path on the origin instead of naming a host.
fn origin_url(origin: &Url, uri: &Uri) -> Url {
    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}

fn from_engine_response(response: Response) -> HttpResponse {
    let mut out = HttpResponse::new(Body::from(response.body));
    *out.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    copy_headers(out.headers_mut(), response.headers);
    out
}

/// Stored header pairs that no longer parse are dropped.
fn copy_headers(map: &mut HeaderMap, headers: Vec<(String, String)>) {
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            map.append(name, value);
        }
    }
}

/// Control message with an implicit reply port.
///
/// Replies come back as the response body; messages without a reply get 204.
async fn post_message(State(host): State<Arc<Host>>, Json(data): Json<Value>) -> Result<HttpResponse, HostError> {
    let (event, mut reply) = MessageEvent::with_reply(data);
    host.dispatch(Event::Message(event)).await?;

    Ok(match reply.try_recv() {
        Ok(reply) => Json(reply).into_response(),
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn post_push(State(host): State<Arc<Host>>, body: Bytes) -> Result<StatusCode, HostError> {
    host.dispatch(Event::Push(body)).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct ClickBody {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

async fn post_notification_click(
    State(host): State<Arc<Host>>, Json(body): Json<ClickBody>,
) -> Result<HttpResponse, HostError> {
    let click = NotificationClick { action: body.action, url: body.url, clients: host.clients().await };
    let outcome = host.dispatch(Event::NotificationClick(click)).await?;

    let result = outcome.effects.iter().find_map(|effect| match effect {
        Effect::FocusClient(id) => Some(json!({ "focused": id })),
        Effect::OpenWindow(url) => Some(json!({ "opened": url })),
        _ => None,
    });
    Ok(match result {
        Some(result) => Json(result).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[derive(Debug, Deserialize)]
struct SyncBody {
    tag: String,
    #[serde(default)]
    periodic: bool,
}

async fn post_sync(State(host): State<Arc<Host>>, Json(body): Json<SyncBody>) -> Result<StatusCode, HostError> {
    if body.tag.trim().is_empty() {
        return Err(HostError::InvalidInput("sync tag is empty".into()));
    }

    let event = if body.periodic { Event::PeriodicSync(body.tag) } else { Event::Sync(body.tag) };
    host.dispatch(event).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ClientBody {
    #[serde(default)]
    id: Option<String>,
    url: String,
}

/// Register a page; the reply says which version controls it, if any.
async fn post_client(State(host): State<Arc<Host>>, Json(body): Json<ClientBody>) -> impl IntoResponse {
    let client = host.register_client(body.id, body.url).await;
    let controller = host.controller_of(&client.id).await;
    Json(json!({ "id": client.id, "url": client.url, "controller": controller }))
}

async fn list_clients(State(host): State<Arc<Host>>) -> impl IntoResponse {
    Json(host.clients().await)
}

async fn events(State(host): State<Arc<Host>>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(host.subscribe()).filter_map(|event| match event {
        Ok(event) => Some(Ok(SseEvent::default().event(event.name).data(event.data.to_string()))),
        Err(e) => {
            tracing::debug!(error = %e, "event stream lagged");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn post_update(State(host): State<Arc<Host>>) -> Result<HttpResponse, HostError> {
    let config = AppConfig::load()?;
    let report = host.update_with(config).await?;
    Ok(Json(report).into_response())
}

async fn health(State(host): State<Arc<Host>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": host.active_version().await,
        "state": host.active_state().await,
    }))
}

async fn unknown_control() -> HostError {
    HostError::InvalidInput("unknown control endpoint".into())
}
