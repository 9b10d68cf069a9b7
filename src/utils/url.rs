// src/utils/url.rs

//! URL canonicalization and article identity.
//!
//! Every article is keyed by its canonical URL, and its id is a fingerprint of
//! that string alone. Both functions are pure so the same logical article gets
//! the same id on every run and in every process.

use sha2::{Digest, Sha256};
use url::{Url, form_urlencoded};

/// Query parameter prefixes that only carry campaign/click tracking.
pub const TRACKING_PARAM_PREFIXES: [&str; 6] =
    ["utm_", "fbclid", "gclid", "mc_cid", "mc_eid", "mkt_tok"];

/// Hex characters kept from the SHA-256 digest.
pub const ID_LEN: usize = 24;

/// Resolve a potentially relative URL against a base URL.
///
/// # Examples
/// ```
/// use harvester::utils::url::resolve;
///
/// assert_eq!(
///     resolve("https://example.com/path/", "page.html"),
///     "https://example.com/path/page.html"
/// );
/// ```
pub fn resolve(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Normalize a URL into its canonical form.
///
/// Never fails: input that cannot be parsed is returned trimmed, without its
/// fragment and without tracking parameters.
///
/// The surviving query is re-encoded as `application/x-www-form-urlencoded`
/// in its original order, so a valueless flag such as `?flag` comes back as
/// `?flag=`.
///
/// # Examples
/// ```
/// use harvester::utils::url::canonicalize;
///
/// assert_eq!(
///     canonicalize("https://Example.com/news/story/?utm_source=x&id=42#top", None),
///     "https://example.com/news/story?id=42"
/// );
/// ```
pub fn canonicalize(raw: &str, base: Option<&str>) -> String {
    let raw = raw.trim();
    let absolute = match base {
        Some(base) if !base.trim().is_empty() => resolve(base.trim(), raw),
        _ => raw.to_string(),
    };

    match parse_with_default_scheme(&absolute) {
        Some(url) => canonicalize_parsed(url),
        None => canonicalize_unparsed(strip_fragment(&absolute)),
    }
}

/// Deterministic fingerprint of a canonical URL (truncated SHA-256, hex).
pub fn derive_id(canonical_url: &str) -> String {
    let digest = Sha256::digest(canonical_url.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ID_LEN);
    id
}

/// Whether a query key is a tracking parameter.
pub fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    TRACKING_PARAM_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

/// Extract the domain from a URL.
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

fn parse_with_default_scheme(candidate: &str) -> Option<Url> {
    if candidate.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(candidate) {
        return Some(url);
    }

    // Protocol-relative ("//host/path") or bare "host.tld/path".
    let with_scheme = if candidate.starts_with("//") {
        format!("https:{candidate}")
    } else if !candidate.starts_with('/') && !candidate.contains("://") {
        format!("https://{candidate}")
    } else {
        return None;
    };

    Url::parse(&with_scheme)
        .ok()
        .filter(|url| url.host_str().is_some_and(|h| h.contains('.')))
}

fn canonicalize_parsed(mut url: Url) -> String {
    // The parser already lower-cases scheme and host and drops default ports.
    url.set_fragment(None);

    if !url.cannot_be_a_base() {
        let path = url.path();
        if path != "/" && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/');
            let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
            url.set_path(&trimmed);
        }
    }

    if let Some(query) = url.query() {
        let kept = filter_query(query);
        url.set_query(kept.as_deref());
    }

    url.to_string()
}

/// Relative or otherwise unparseable input: only the query is cleaned.
fn canonicalize_unparsed(raw: &str) -> String {
    match raw.split_once('?') {
        Some((head, query)) => match filter_query(query) {
            Some(kept) => format!("{head}?{kept}"),
            None => head.to_string(),
        },
        None => raw.to_string(),
    }
}

/// Drop tracking pairs and re-encode the rest. `None` when nothing is left.
fn filter_query(query: &str) -> Option<String> {
    let mut kept = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if !is_tracking_param(&key) {
            kept.append_pair(&key, &value);
            any = true;
        }
    }
    any.then(|| kept.finish())
}

fn strip_fragment(raw: &str) -> &str {
    raw.split_once('#').map_or(raw, |(before, _)| before)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_tracking_and_fragment() {
        let url = "https://Example.com/news/story/?utm_source=x&utm_medium=y&id=42#top";
        assert_eq!(canonicalize(url, None), "https://example.com/news/story?id=42");
    }

    #[test]
    fn test_canonicalize_drops_default_ports() {
        assert_eq!(
            canonicalize("https://example.com:443/a", None),
            "https://example.com/a"
        );
        assert_eq!(
            canonicalize("http://example.com:80/a", None),
            "http://example.com/a"
        );
        assert_eq!(
            canonicalize("http://example.com:8080/a", None),
            "http://example.com:8080/a"
        );
    }

    #[test]
    fn test_canonicalize_keeps_root_path() {
        assert_eq!(canonicalize("https://example.com/", None), "https://example.com/");
        assert_eq!(canonicalize("https://example.com", None), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_resolves_relative_against_base() {
        assert_eq!(
            canonicalize("/2026/02/roast-report/", Some("https://dailycoffeenews.com")),
            "https://dailycoffeenews.com/2026/02/roast-report"
        );
        assert_eq!(
            canonicalize("https://other.com/x", Some("https://dailycoffeenews.com")),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_canonicalize_defaults_scheme() {
        assert_eq!(
            canonicalize("//cdn.example.com/img.jpg", None),
            "https://cdn.example.com/img.jpg"
        );
        assert_eq!(
            canonicalize("example.com/news", None),
            "https://example.com/news"
        );
    }

    #[test]
    fn test_canonicalize_preserves_order_and_blank_values() {
        assert_eq!(
            canonicalize("https://example.com/p?b=2&fbclid=zz&a=&c=3&gclid=1", None),
            "https://example.com/p?b=2&a=&c=3"
        );
        assert_eq!(
            canonicalize("https://example.com/p?UTM_Source=x&MC_CID=y", None),
            "https://example.com/p"
        );
    }

    #[test]
    fn test_canonicalize_is_total() {
        assert_eq!(canonicalize("", None), "");
        assert_eq!(canonicalize("  not a url#frag ", None), "not a url");
        assert_eq!(canonicalize("/relative/only", None), "/relative/only");
    }

    #[test]
    fn test_canonicalize_unparsed_drops_tracking() {
        assert_eq!(canonicalize("/rel?utm_source=x&a=1", None), "/rel?a=1");
        assert_eq!(canonicalize("/rel?fbclid=1#top", None), "/rel");
        assert_eq!(canonicalize("/rel?a=1&b=2", None), "/rel?a=1&b=2");
    }

    #[test]
    fn test_canonicalize_valueless_flag_gets_equals() {
        assert_eq!(
            canonicalize("https://example.com/a?flag&utm_x=1", None),
            "https://example.com/a?flag="
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let samples = [
            "https://Example.com/news/story/?utm_source=x&utm_medium=y&id=42#top",
            "HTTP://Example.COM:80/a//?q=hello world&utm_campaign=z",
            "https://example.com/path?x=%20y&empty=",
            "//cdn.example.com/img.jpg?fbclid=1",
            "example.com/news/",
            "not a url#frag",
            "/rel?utm_source=x&a=1 b",
            "mailto:press@example.com",
            "",
        ];
        for sample in samples {
            let once = canonicalize(sample, None);
            assert_eq!(canonicalize(&once, None), once, "not idempotent for {sample}");
        }
    }

    #[test]
    fn test_derive_id_is_deterministic() {
        let canonical = "https://example.com/news/story";
        let id = derive_id(canonical);
        assert_eq!(id, derive_id(canonical));
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, derive_id("https://example.com/news/story2"));
    }

    #[test]
    fn test_resolve_relative_from_file() {
        assert_eq!(
            resolve("https://example.com/path/index.html", "other.html"),
            "https://example.com/path/other.html"
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Example.COM/path"),
            Some("example.com".to_string())
        );
        assert_eq!(get_domain("invalid-url"), None);
    }
}
