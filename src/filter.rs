use crate::utils::is_internal_url;
use regex::Regex;
use url::Url;

/// Path substrings that are never followed
pub const DENIED_SUBSTRINGS: [&str; 3] = ["logout", "wp-admin", "cart"];

/// Static assets are not content pages
pub const ASSET_PATTERN: &str =
    r"(?i)\.(jpg|jpeg|png|gif|webp|avif|svg|ico|css|js|woff|woff2|ttf|eot|pdf|zip|mp4|webm|mp3)$";

/// Well-known metadata files are fetched separately, never as content pages
pub const SPECIAL_FILE_PATTERN: &str = r"(?i)(^|/)(robots\.txt|llms\.txt|sitemap[^/]*\.xml)$";

/// Configuration for link filtering
#[derive(Debug, Clone)]
pub struct LinkFilterConfig {
    /// Host that links must stay on (its `www.` twin and subdomains are allowed too)
    pub base_domain: String,

    /// Lowercased substrings that reject a URL anywhere they appear
    pub denied_substrings: Vec<String>,

    /// Regex patterns for URLs to exclude
    pub exclude_patterns: Vec<String>,
}

impl LinkFilterConfig {
    pub fn for_domain(base_domain: &str) -> Self {
        Self {
            base_domain: base_domain.to_ascii_lowercase(),
            denied_substrings: DENIED_SUBSTRINGS.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: vec![ASSET_PATTERN.to_string(), SPECIAL_FILE_PATTERN.to_string()],
        }
    }
}

/// Decides which discovered links are worth queueing
#[derive(Debug)]
pub struct LinkFilter {
    config: LinkFilterConfig,
    exclude_regexes: Vec<Regex>,
}

impl LinkFilter {
    /// Create a new link filter from configuration
    pub fn new(config: LinkFilterConfig) -> Result<Self, regex::Error> {
        let mut exclude_regexes = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            config,
            exclude_regexes,
        })
    }

    /// Filter with the default denylist and asset exclusions
    pub fn for_domain(base_domain: &str) -> Result<Self, regex::Error> {
        Self::new(LinkFilterConfig::for_domain(base_domain))
    }

    /// Determine if a link should be queued
    pub fn should_crawl(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        if !is_internal_url(url.as_str(), &self.config.base_domain) {
            return false;
        }

        let lower = url.as_str().to_ascii_lowercase();
        if self
            .config
            .denied_substrings
            .iter()
            .any(|s| lower.contains(s.as_str()))
        {
            return false;
        }

        // Match against the path so query strings don't hide extensions
        !self.exclude_regexes.iter().any(|r| r.is_match(url.path()))
    }

    /// Resolves `href` against `base` and returns the fragment-free URL if it passes the filter.
    pub fn accept(&self, base: &Url, href: &str) -> Option<Url> {
        let mut resolved = base.join(href.trim()).ok()?;
        resolved.set_fragment(None);
        if self.should_crawl(&resolved) {
            Some(resolved)
        } else {
            ::log::trace!("Link filter rejected: {}", resolved);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> LinkFilter {
        LinkFilter::for_domain("example.com").unwrap()
    }

    #[test]
    fn test_same_domain_only() {
        let f = filter();
        assert!(f.should_crawl(&Url::parse("https://example.com/rooms").unwrap()));
        assert!(f.should_crawl(&Url::parse("https://www.example.com/spa").unwrap()));
        assert!(f.should_crawl(&Url::parse("https://booking.example.com/").unwrap()));
        assert!(!f.should_crawl(&Url::parse("https://tripadvisor.com/hotel").unwrap()));
    }

    #[test]
    fn test_denylist() {
        let f = filter();
        assert!(!f.should_crawl(&Url::parse("https://example.com/wp-admin/").unwrap()));
        assert!(!f.should_crawl(&Url::parse("https://example.com/Cart?x=1").unwrap()));
        assert!(!f.should_crawl(&Url::parse("https://example.com/account/logout").unwrap()));
    }

    #[test]
    fn test_assets_and_schemes_excluded() {
        let f = filter();
        assert!(!f.should_crawl(&Url::parse("https://example.com/img/hero.JPG").unwrap()));
        assert!(!f.should_crawl(&Url::parse("https://example.com/brochure.pdf?v=2").unwrap()));
        assert!(!f.should_crawl(&Url::parse("mailto:info@example.com").unwrap()));
    }

    #[test]
    fn test_special_files_are_not_content() {
        let f = filter();
        for url in [
            "https://example.com/sitemap.xml",
            "https://example.com/sitemap_index.xml?page=2",
            "https://example.com/ROBOTS.TXT",
            "https://example.com/.well-known/llms.txt",
        ] {
            assert!(!f.should_crawl(&Url::parse(url).unwrap()), "{url} should be rejected");
        }
        assert!(f.should_crawl(&Url::parse("https://example.com/sitemap").unwrap()));
    }

    #[test]
    fn test_accept_resolves_and_strips_fragment() {
        let f = filter();
        let base = Url::parse("https://example.com/rooms/").unwrap();
        assert_eq!(
            f.accept(&base, "suite#gallery").map(|u| u.to_string()),
            Some("https://example.com/rooms/suite".to_string())
        );
        assert_eq!(f.accept(&base, "https://other.org/"), None);
        assert_eq!(f.accept(&base, "javascript:void(0)"), None);
    }
}
