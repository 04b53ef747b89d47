//! URL helpers
//!
//! Resolution and hash-change detection on top of the `url` crate.

use crate::{NavigationError, Result};
use url::Url;

/// Parse an absolute URL
pub fn parse_url(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|e| NavigationError::InvalidUrl(format!("{input}: {e}")))
}

/// Resolve a possibly relative URL against a base
pub fn resolve_url(base: &str, input: &str) -> Result<Url> {
    let base = parse_url(base)?;
    base.join(input)
        .map_err(|e| NavigationError::InvalidUrl(format!("{input}: {e}")))
}

/// `location.hash` semantics: an empty fragment reads the same as none
fn hash(url: &Url) -> &str {
    url.fragment().unwrap_or("")
}

/// `location.search` semantics: an empty query reads the same as none
fn search(url: &Url) -> &str {
    url.query().unwrap_or("")
}

/// Whether going from `from` to `to` only changes the fragment
pub fn is_hash_change(from: &Url, to: &Url) -> bool {
    hash(from) != hash(to)
        && from.host_str() == to.host_str()
        && from.path() == to.path()
        && search(from) == search(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        parse_url(s).unwrap()
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://example.com/a/b", "c").unwrap().as_str(),
            "https://example.com/a/c"
        );
        assert_eq!(
            resolve_url("https://example.com/a", "#top").unwrap().as_str(),
            "https://example.com/a#top"
        );
        assert_eq!(
            resolve_url("https://example.com/a", "https://other.org/").unwrap().as_str(),
            "https://other.org/"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(parse_url("not a url"), Err(NavigationError::InvalidUrl(_))));
        assert!(matches!(
            resolve_url("relative/base", "x"),
            Err(NavigationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_hash_change() {
        assert!(is_hash_change(&url("http://x/#a"), &url("http://x/#b")));
        assert!(is_hash_change(&url("http://x/page"), &url("http://x/page#b")));
        assert!(is_hash_change(&url("http://x/p?q=1#a"), &url("http://x/p?q=1")));
    }

    #[test]
    fn test_not_hash_change() {
        // Same URL
        assert!(!is_hash_change(&url("http://x/#a"), &url("http://x/#a")));
        // Empty fragment equals no fragment
        assert!(!is_hash_change(&url("http://x/"), &url("http://x/#")));
        assert!(!is_hash_change(&url("http://x/#a"), &url("http://x/other#b")));
        assert!(!is_hash_change(&url("http://x/?q=1#a"), &url("http://x/?q=2#b")));
        assert!(!is_hash_change(&url("http://x/#a"), &url("http://y/#b")));
    }
}
