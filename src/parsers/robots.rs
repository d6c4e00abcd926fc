use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Upper bound on sitemap URLs followed from one robots.txt
pub const MAX_SITEMAP_CANDIDATES: usize = 10;

fn sitemap_directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*sitemap\s*:\s*(.+?)\s*$").expect("valid sitemap regex"))
}

/// Raw values of every `Sitemap:` line, in file order
pub fn sitemap_directives(robots_txt: &str) -> Vec<String> {
    robots_txt
        .lines()
        .filter_map(|line| sitemap_directive().captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Sitemap URLs declared by a robots.txt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapCandidates {
    /// Resolved, deduplicated URLs, capped at [`MAX_SITEMAP_CANDIDATES`]
    pub urls: Vec<String>,
    /// Distinct resolvable declarations before capping
    pub found: usize,
}

impl SitemapCandidates {
    pub fn is_capped(&self) -> bool {
        self.found > self.urls.len()
    }
}

/// Resolves every `Sitemap:` value against the URL the robots.txt was served from.
pub fn sitemap_candidates(robots_txt: &str, robots_url: &Url) -> SitemapCandidates {
    let mut resolved: Vec<String> = Vec::new();
    for raw in sitemap_directives(robots_txt) {
        match robots_url.join(&raw) {
            Ok(mut url) => {
                url.set_fragment(None);
                let url = url.to_string();
                if !resolved.contains(&url) {
                    resolved.push(url);
                }
            }
            Err(e) => ::log::debug!("Ignoring unresolvable sitemap {:?}: {}", raw, e),
        }
    }

    let found = resolved.len();
    resolved.truncate(MAX_SITEMAP_CANDIDATES);
    SitemapCandidates {
        urls: resolved,
        found,
    }
}
