//! URL canonicalization and resolution against the origin.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for swcache_core::Error {
    fn from(err: UrlError) -> Self {
        swcache_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize an absolute URL string for consistent store keys.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Lowercase the host
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a manifest path or page URL against the origin.
///
/// Absolute http(s) URLs are canonicalized as-is; anything else is joined
/// onto `origin`.
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    if trimmed.contains("://") {
        return canonicalize(trimmed);
    }

    let mut joined = origin
        .join(trimmed)
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    joined.set_fragment(None);
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.example.com/").unwrap()
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://example.com#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://example.com?a=1&b=2").unwrap();
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_whitespace_only() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve(&origin(), "/index.html").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/index.html");
    }

    #[test]
    fn test_resolve_keeps_query_drops_fragment() {
        let url = resolve(&origin(), "/search?q=rust#top").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/search?q=rust");
    }

    #[test]
    fn test_resolve_absolute() {
        let url = resolve(&origin(), "https://CDN.example.net/lib.js").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.net/lib.js");
    }

    #[test]
    fn test_resolve_under_subpath_origin() {
        let base = Url::parse("https://user.github.io/Site/").unwrap();
        assert_eq!(resolve(&base, "manifest.json").unwrap().as_str(), "https://user.github.io/Site/manifest.json");
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), ""), Err(UrlError::Empty)));
    }
}
