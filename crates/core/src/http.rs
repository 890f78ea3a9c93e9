//! Request and response values exchanged between the host and the engine.
//!
//! These are deliberately plain data: the engine never touches sockets, so
//! handlers can be driven directly from tests.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    /// Anything else: scripts, images, XHR.
    #[default]
    Subresource,
}

impl RequestMode {
    /// Derive the mode from a `Sec-Fetch-Mode` header value.
    pub fn from_fetch_mode(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("navigate") => RequestMode::Navigate,
            _ => RequestMode::Subresource,
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    /// Only forwarded on pass-through; intercepted GETs carry none.
    pub body: Bytes,
}

impl Request {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
            mode: RequestMode::Subresource,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A GET navigation request, as issued by the address bar or a link.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup returning the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Navigation requests get the offline page instead of a bare error.
    ///
    /// Either the fetch mode says so or the client asked for HTML.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate || self.header("accept").is_some_and(|accept| accept.contains("text/html"))
    }
}

/// A response, either fresh from the network, stored, or synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Only 2xx responses are ever written to a store.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Parse an HTTP `Date` header value.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
