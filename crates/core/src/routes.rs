//! Route classification: which requests are intercepted, and how.
//!
//! The table is data. Built-in defaults cover a typical static site; a TOML
//! routes file replaces them wholesale:
//!
//! ```toml
//! [exclude]
//! schemes = ["chrome-extension"]
//! extensions = ["mp4", "webm"]
//! hosts = ["youtube.com"]
//!
//! [[rules]]
//! matcher = { extensions = ["png", "css", "js"] }
//! strategy = "cache-first"
//!
//! [[rules]]
//! matcher = { path_prefix = "/api/" }
//! strategy = "network-first"
//! ```

use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Request};

/// Per-request caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

/// How a rule recognises a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// Path ends with `.<ext>` for one of the listed extensions.
    Extensions(Vec<String>),
    PathPrefix(String),
    /// Regular expression tested against the path.
    PathPattern(String),
    /// Host contains the given substring.
    Host(String),
    /// Same scheme, host and port as the configured origin.
    SameOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub matcher: Matcher,
    pub strategy: Strategy,
}

/// Requests the engine never intercepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusions {
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
}

/// On-disk shape of the routes file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutesFile {
    #[serde(default)]
    pub exclude: Exclusions,
    #[serde(default)]
    pub rules: Vec<RouteRule>,
}

impl Default for RoutesFile {
    fn default() -> Self {
        let assets = ["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js", "woff", "woff2"];
        Self {
            exclude: Exclusions {
                schemes: vec!["chrome-extension".into()],
                extensions: Vec::from(["mp4", "webm", "m3u8", "m3u"].map(String::from)),
                hosts: Vec::from(["youtube.com", "youtu.be", "cloudinary.com"].map(String::from)),
            },
            rules: vec![
                RouteRule {
                    matcher: Matcher::Extensions(Vec::from(assets.map(String::from))),
                    strategy: Strategy::CacheFirst,
                },
                RouteRule { matcher: Matcher::PathPrefix("/api/".into()), strategy: Strategy::NetworkFirst },
                RouteRule { matcher: Matcher::SameOrigin, strategy: Strategy::CacheFirst },
            ],
        }
    }
}

impl RoutesFile {
    /// Read a routes file from TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        Figment::from(Toml::file_exact(path))
            .extract()
            .map_err(|e| Error::InvalidInput(format!("routes file {}: {e}", path.display())))
    }
}

/// Outcome of classifying one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the host forwards it untouched.
    PassThrough,
    Intercept(Strategy),
}

#[derive(Debug)]
enum CompiledMatcher {
    Extensions(Vec<String>),
    PathPrefix(String),
    PathPattern(Regex),
    Host(String),
    SameOrigin,
}

impl CompiledMatcher {
    fn compile(matcher: Matcher) -> Result<Self, Error> {
        Ok(match matcher {
            Matcher::Extensions(exts) => CompiledMatcher::Extensions(normalize_extensions(exts)),
            Matcher::PathPrefix(prefix) => CompiledMatcher::PathPrefix(prefix),
            Matcher::PathPattern(pattern) => CompiledMatcher::PathPattern(
                Regex::new(&pattern).map_err(|e| Error::InvalidInput(format!("route pattern {pattern}: {e}")))?,
            ),
            Matcher::Host(host) => CompiledMatcher::Host(host.to_ascii_lowercase()),
            Matcher::SameOrigin => CompiledMatcher::SameOrigin,
        })
    }

    fn matches(&self, url: &Url, origin: &Url) -> bool {
        match self {
            CompiledMatcher::Extensions(exts) => has_extension(url, exts),
            CompiledMatcher::PathPrefix(prefix) => url.path().starts_with(prefix.as_str()),
            CompiledMatcher::PathPattern(re) => re.is_match(url.path()),
            CompiledMatcher::Host(host) => url.host_str().is_some_and(|h| h.contains(host.as_str())),
            CompiledMatcher::SameOrigin => url.origin() == origin.origin(),
        }
    }
}

/// Ordered, first-match-wins classification table.
#[derive(Debug)]
pub struct RouteTable {
    origin: Url,
    exclude: Exclusions,
    rules: Vec<(CompiledMatcher, Strategy)>,
}

impl RouteTable {
    /// Compile a routes file against the origin the engine fronts.
    pub fn new(origin: Url, file: RoutesFile) -> Result<Self, Error> {
        let rules = file
            .rules
            .into_iter()
            .map(|rule| Ok((CompiledMatcher::compile(rule.matcher)?, rule.strategy)))
            .collect::<Result<Vec<_>, Error>>()?;

        let exclude = Exclusions {
            schemes: file.exclude.schemes.iter().map(|s| s.to_ascii_lowercase()).collect(),
            extensions: normalize_extensions(file.exclude.extensions),
            hosts: file.exclude.hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
        };

        Ok(Self { origin, exclude, rules })
    }

    /// Large media and foreign schemes are never intercepted.
    pub fn is_excluded(&self, url: &Url) -> bool {
        if self.exclude.schemes.iter().any(|s| s == url.scheme()) {
            return true;
        }
        if has_extension(url, &self.exclude.extensions) {
            return true;
        }
        url.host_str()
            .is_some_and(|host| self.exclude.hosts.iter().any(|h| host.contains(h.as_str())))
    }

    /// Decide how the engine handles `request`.
    ///
    /// Non-GET and excluded requests pass through; otherwise the first
    /// matching rule wins and unmatched requests are network-first.
    pub fn classify(&self, request: &Request) -> Route {
        if !request.is_get() || self.is_excluded(&request.url) {
            return Route::PassThrough;
        }

        let strategy = self
            .rules
            .iter()
            .find(|(matcher, _)| matcher.matches(&request.url, &self.origin))
            .map_or(Strategy::NetworkFirst, |(_, strategy)| *strategy);

        Route::Intercept(strategy)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

fn normalize_extensions(exts: Vec<String>) -> Vec<String> {
    exts.into_iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

fn has_extension(url: &Url, exts: &[String]) -> bool {
    let path = url.path();
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    // a dot in a directory name is not an extension
    if ext.contains('/') {
        return false;
    }
    exts.iter().any(|e| e.eq_ignore_ascii_case(ext))
}
