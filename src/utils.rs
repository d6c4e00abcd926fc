use crate::results::RedirectHop;
use chrono::{SecondsFormat, Utc};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Maximum length of a blob-store key after sanitizing.
pub const MAX_KEY_LEN: usize = 240;

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Prefixes a scheme when the input has none.
///
/// Already-schemed input is returned unchanged, protocol-relative input (`//host`) gets `https:`
/// and anything else gets `https://`. Blank input yields an empty string.
pub fn ensure_https_url(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        return s.to_string();
    }
    if s.starts_with("//") {
        return format!("https:{s}");
    }
    format!("https://{s}")
}

/// Turns a bare or schemed domain into the canonical homepage URL, always ending in a single `/`.
pub fn normalize_domain_to_home_url(domain: &str) -> String {
    let trimmed = domain.trim();
    let lower = trimmed.to_ascii_lowercase();
    let without_scheme = if lower.starts_with("https://") {
        &trimmed["https://".len()..]
    } else if lower.starts_with("http://") {
        &trimmed["http://".len()..]
    } else {
        trimmed
    };
    let host = without_scheme.trim_end_matches('/');
    format!("{}/", ensure_https_url(host))
}

/// Trims every item, drops blanks and removes duplicates while keeping first-seen order.
pub fn uniq_strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in items {
        let s = raw.as_ref().trim();
        if s.is_empty() || !seen.insert(s.to_string()) {
            continue;
        }
        out.push(s.to_string());
    }
    out
}

/// Whether `url` points at `base_domain`, its `www.` twin, or one of its subdomains.
///
/// Unparseable URLs are treated as external.
pub fn is_internal_url(url: &str, base_domain: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let base = base_domain.to_ascii_lowercase();
    host == base || host == format!("www.{base}") || host.ends_with(&format!(".{base}"))
}

/// Builds an origin/destination redirect chain.
///
/// This does not reconstruct intermediate hops: a redirected request yields exactly two entries,
/// both resolving to `final_url`.
pub fn build_redirect_chain_simple(
    url: &str,
    final_url: Option<&str>,
    status: Option<u16>,
) -> Vec<RedirectHop> {
    match final_url {
        Some(final_url) if final_url != url => vec![
            RedirectHop {
                url: url.to_string(),
                status,
                location: None,
                resolved_url: Some(final_url.to_string()),
            },
            RedirectHop {
                url: final_url.to_string(),
                status,
                location: None,
                resolved_url: Some(final_url.to_string()),
            },
        ],
        _ => vec![RedirectHop {
            url: url.to_string(),
            status,
            location: None,
            resolved_url: None,
        }],
    }
}

/// Clamps `value` into `[min, max]`.
pub fn clamp_int<T: Ord>(value: T, min: T, max: T) -> T {
    value.clamp(min, max)
}

/// Case-insensitive header lookup.
pub fn pick_header<'a>(headers: Option<&'a BTreeMap<String, String>>, name: &str) -> Option<&'a str> {
    headers?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A missing content type is assumed to be HTML.
pub fn is_probably_html(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => ct.to_ascii_lowercase().contains("text/html"),
    }
}

/// Strips the fragment from a URL; unparseable input is returned as-is.
pub fn canonicalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Convert a blob key into the store's safe charset.
pub fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut last_was_separator = false;
    for c in key.chars() {
        if c == '/' || c == '\\' {
            // runs of separators collapse into one underscore
            if !last_was_separator {
                out.push('_');
            }
            last_was_separator = true;
            continue;
        }
        last_was_separator = false;
        if c.is_ascii_alphanumeric() || "!-_.()'".contains(c) {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out.chars().take(MAX_KEY_LEN).collect()
}

/// Truncates to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_https_url() {
        assert_eq!(ensure_https_url("example.com"), "https://example.com");
        assert_eq!(ensure_https_url("http://example.com"), "http://example.com");
        assert_eq!(ensure_https_url("https://example.com"), "https://example.com");
        assert_eq!(ensure_https_url("//example.com"), "https://example.com");
        assert_eq!(ensure_https_url("   "), "");
    }

    #[test]
    fn test_normalize_domain_to_home_url() {
        assert_eq!(normalize_domain_to_home_url("example.com"), "https://example.com/");
        assert_eq!(normalize_domain_to_home_url("https://example.com/"), "https://example.com/");
        assert_eq!(normalize_domain_to_home_url("HTTP://example.com///"), "https://example.com/");
        assert_eq!(normalize_domain_to_home_url(" example.com/ "), "https://example.com/");
    }

    #[test]
    fn test_home_url_always_schemed_with_one_trailing_slash() {
        for d in ["a.com", "a.com/", "https://a.com", "http://a.com//", "www.a.com", "Https://a.com/"] {
            let home = normalize_domain_to_home_url(d);
            assert!(home.starts_with("https://") || home.starts_with("http://"), "{home}");
            assert!(home.ends_with('/') && !home.ends_with("//"), "{home}");
        }
    }

    #[test]
    fn test_uniq_strings() {
        assert_eq!(uniq_strings([" a ", "a", "b", "  ", "b "]), vec!["a", "b"]);
    }

    #[test]
    fn test_is_internal_url() {
        assert!(is_internal_url("https://example.com/rooms", "example.com"));
        assert!(is_internal_url("https://www.example.com/", "example.com"));
        assert!(is_internal_url("https://book.example.com/x", "EXAMPLE.com"));
        assert!(!is_internal_url("https://notexample.com/", "example.com"));
        assert!(!is_internal_url("https://example.com.evil.net/", "example.com"));
        assert!(!is_internal_url("not a url", "example.com"));
    }

    #[test]
    fn test_redirect_chain_without_redirect() {
        let chain = build_redirect_chain_simple("https://a/", Some("https://a/"), Some(200));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].url, "https://a/");
        assert_eq!(chain[0].status, Some(200));
        assert_eq!(chain[0].resolved_url, None);

        assert_eq!(build_redirect_chain_simple("https://a/", None, None).len(), 1);
    }

    #[test]
    fn test_redirect_chain_with_redirect() {
        let chain = build_redirect_chain_simple("https://a/", Some("https://b/"), Some(301));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].url, "https://a/");
        assert_eq!(chain[1].url, "https://b/");
        assert!(chain.iter().all(|h| h.resolved_url.as_deref() == Some("https://b/")));
        assert!(chain.iter().all(|h| h.status == Some(301)));
    }

    #[test]
    fn test_pick_header_and_html_detection() {
        let mut h = BTreeMap::new();
        h.insert("Content-Type".to_string(), "text/html".to_string());
        assert_eq!(pick_header(Some(&h), "content-type"), Some("text/html"));
        assert_eq!(pick_header(None, "x"), None);

        assert!(is_probably_html(None));
        assert!(is_probably_html(Some("text/html; charset=utf-8")));
        assert!(!is_probably_html(Some("application/xml")));
    }

    #[test]
    fn test_clamp_int() {
        assert_eq!(clamp_int(10, 1, 5), 5);
        assert_eq!(clamp_int(-10, 1, 5), 1);
        assert_eq!(clamp_int(3, 1, 5), 3);
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("home-mobile-H1-1.png"), "home-mobile-H1-1.png");
        assert_eq!(sanitize_key("screens//a b:c.png"), "screens_a_b_c.png");
        assert_eq!(sanitize_key(&"x".repeat(300)).len(), MAX_KEY_LEN);
    }

    #[test]
    fn test_canonicalize_strips_fragment() {
        assert_eq!(canonicalize_url("https://a.com/x#top"), "https://a.com/x");
        assert_eq!(canonicalize_url("::bad"), "::bad");
    }
}
