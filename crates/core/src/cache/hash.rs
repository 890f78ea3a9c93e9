//! Request identity for cache lookups.

use sha2::{Digest, Sha256};

/// Compute the store key for a request.
///
/// Keys cover method and URL only; callers pass the canonical URL string.
pub fn request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let a = request_key("GET", "https://example.com/");
        let b = request_key("get", "https://example.com/");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_depends_on_url() {
        assert_ne!(request_key("GET", "https://example.com/a"), request_key("GET", "https://example.com/b"));
    }

    #[test]
    fn test_key_depends_on_method() {
        assert_ne!(request_key("GET", "https://example.com/"), request_key("HEAD", "https://example.com/"));
    }

    #[test]
    fn test_key_format() {
        let key = request_key("GET", "https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
