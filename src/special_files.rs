//! Follow-up logic for `robots.txt`, `sitemap.xml` and `llms.txt`.
//!
//! Nothing here is queued until the homepage has been visited successfully. A sitemap declared
//! in robots.txt takes precedence over the default `/sitemap.xml`, which is queued at most once.
//! A missing `/llms.txt` is retried once at `/.well-known/llms.txt`.

use crate::frontier::{Frontier, FrontierEntry, SpecialFileKind};
use crate::parsers::robots::{MAX_SITEMAP_CANDIDATES, sitemap_candidates};
use crate::results::SpecialFilesBlock;
use url::Url;

/// Special-file requests allowed on top of the content budget
pub const SPECIAL_FILE_BUDGET: u32 = 3 + MAX_SITEMAP_CANDIDATES as u32;

const LLMS_FALLBACK_PATH: &str = "/.well-known/llms.txt";

/// What fetching a special file produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialFetch {
    Fetched {
        status: Option<u16>,
        final_url: String,
        body: String,
    },
    Failed(String),
}

impl SpecialFetch {
    /// The body, when the response was 2xx/3xx and non-empty
    fn usable_body(&self) -> Option<&str> {
        match self {
            SpecialFetch::Fetched { status, body, .. } if is_success(*status) && !body.trim().is_empty() => {
                Some(body.as_str())
            }
            _ => None,
        }
    }
}

fn is_success(status: Option<u16>) -> bool {
    status.is_none_or(|s| (200..400).contains(&s))
}

fn status_label(status: Option<u16>) -> String {
    status.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}

/// Requests and warnings produced by handling one special-file visit
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Queued at the front of the frontier, in this order
    pub follow_ups: Vec<FrontierEntry>,
    pub warnings: Vec<String>,
}

/// Run-scoped state of the special-file follow-ups.
///
/// The resolver queues its own requests so that the once-only flags are set only for
/// requests the frontier actually accepted.
#[derive(Debug, Default)]
pub struct SpecialFileResolver {
    origin: Option<Url>,
    files: SpecialFilesBlock,
    sitemap_queued: bool,
    llms_fallback_queued: bool,
}

impl SpecialFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the homepage's resolved URL and queues the robots.txt and llms.txt requests.
    pub fn activate(&mut self, home_final_url: &Url, frontier: &mut Frontier) -> Vec<FrontierEntry> {
        if self.origin.is_some() {
            return Vec::new();
        }
        let mut origin = home_final_url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        let entries = [
            ("/robots.txt", SpecialFileKind::Robots),
            ("/llms.txt", SpecialFileKind::Llms),
        ]
        .into_iter()
        .filter_map(|(path, kind)| origin.join(path).ok().map(|u| FrontierEntry::special(u.as_str(), kind)))
        .collect();

        self.origin = Some(origin);
        frontier.enqueue_front_all(entries)
    }

    pub fn handle(
        &mut self,
        kind: SpecialFileKind,
        request_url: &str,
        fetch: SpecialFetch,
        frontier: &mut Frontier,
    ) -> Resolution {
        match kind {
            SpecialFileKind::Robots => self.handle_robots(request_url, fetch, frontier),
            SpecialFileKind::Sitemap => self.handle_sitemap(request_url, fetch),
            SpecialFileKind::Llms => self.handle_llms(request_url, fetch, frontier),
        }
    }

    fn handle_robots(&mut self, request_url: &str, fetch: SpecialFetch, frontier: &mut Frontier) -> Resolution {
        let mut resolution = Resolution::default();

        if let Some(body) = fetch.usable_body() {
            self.files.robots_txt = Some(body.to_string());

            let robots_url = match &fetch {
                SpecialFetch::Fetched { final_url, .. } => Url::parse(final_url).or_else(|_| Url::parse(request_url)),
                SpecialFetch::Failed(_) => Url::parse(request_url),
            };
            if let Ok(robots_url) = robots_url {
                let candidates = sitemap_candidates(body, &robots_url);
                if candidates.is_capped() {
                    resolution.warnings.push(format!(
                        "sitemap-candidates-capped: found {}, queued {}",
                        candidates.found,
                        candidates.urls.len()
                    ));
                }
                if !candidates.urls.is_empty() {
                    ::log::info!("robots.txt declares {} sitemap(s)", candidates.found);
                    let entries = candidates
                        .urls
                        .iter()
                        .map(|u| FrontierEntry::special(u, SpecialFileKind::Sitemap))
                        .collect();
                    resolution.follow_ups = frontier.enqueue_front_all(entries);
                    if !resolution.follow_ups.is_empty() {
                        self.sitemap_queued = true;
                        return resolution;
                    }
                }
            }
        } else {
            match &fetch {
                SpecialFetch::Failed(error) => {
                    resolution.warnings.push(format!("robots-failed: {request_url}: {error}"));
                }
                SpecialFetch::Fetched { status, .. } if !is_success(*status) => {
                    resolution
                        .warnings
                        .push(format!("robots-non-200: {request_url} ({})", status_label(*status)));
                }
                SpecialFetch::Fetched { .. } => ::log::debug!("Empty robots.txt at {}", request_url),
            }
        }

        if !self.sitemap_queued {
            resolution.follow_ups.extend(self.queue_at_origin(
                "/sitemap.xml",
                SpecialFileKind::Sitemap,
                frontier,
            ));
            self.sitemap_queued = !resolution.follow_ups.is_empty();
        }
        resolution
    }

    fn handle_sitemap(&mut self, request_url: &str, fetch: SpecialFetch) -> Resolution {
        let mut resolution = Resolution::default();
        match &fetch {
            SpecialFetch::Failed(error) => {
                resolution.warnings.push(format!("sitemap-failed: {request_url}: {error}"));
            }
            SpecialFetch::Fetched { status, .. } if !is_success(*status) => {
                resolution
                    .warnings
                    .push(format!("sitemap-non-200: {request_url} ({})", status_label(*status)));
            }
            SpecialFetch::Fetched { body, .. } if body.trim().is_empty() => {
                resolution.warnings.push(format!("sitemap-empty: {request_url}"));
            }
            SpecialFetch::Fetched { body, .. } => {
                if self.files.sitemap_xml.is_none() {
                    self.files.sitemap_xml = Some(body.clone());
                } else {
                    ::log::debug!("Keeping first sitemap, ignoring {}", request_url);
                }
            }
        }
        resolution
    }

    fn handle_llms(&mut self, request_url: &str, fetch: SpecialFetch, frontier: &mut Frontier) -> Resolution {
        let mut resolution = Resolution::default();
        if let Some(body) = fetch.usable_body() {
            if self.files.llms_txt.is_none() {
                self.files.llms_txt = Some(body.to_string());
            }
            return resolution;
        }

        ::log::debug!("No llms.txt at {}", request_url);
        if !self.llms_fallback_queued {
            resolution.follow_ups = self
                .queue_at_origin(LLMS_FALLBACK_PATH, SpecialFileKind::Llms, frontier)
                .into_iter()
                .collect();
            self.llms_fallback_queued = !resolution.follow_ups.is_empty();
        }
        resolution
    }

    /// Queues `path` on the homepage origin at the front; `None` if it was already seen.
    fn queue_at_origin(&self, path: &str, kind: SpecialFileKind, frontier: &mut Frontier) -> Option<FrontierEntry> {
        let url = self.origin.as_ref()?.join(path).ok()?;
        frontier
            .enqueue_front_all(vec![FrontierEntry::special(url.as_str(), kind)])
            .pop()
    }

    pub fn files(&self) -> &SpecialFilesBlock {
        &self.files
    }

    pub fn into_files(self) -> SpecialFilesBlock {
        self.files
    }
}
