use crate::browser::{BrowserPage, NavigationResponse};
use crate::capture::{HomeVisit, capture_home};
use crate::config::RunConfig;
use crate::error::BrowserError;
use crate::filter::LinkFilter;
use crate::frontier::{Frontier, FrontierEntry, Priority, RequestKind, SpecialFileKind};
use crate::parsers::html::{base_href, outbound_domains, parse_links};
use crate::results::{ErrorCode, HomeSnapshot, PageRecord, SpecialFilesBlock};
use crate::special_files::{SPECIAL_FILE_BUDGET, SpecialFetch, SpecialFileResolver};
use crate::store::BlobStore;
use crate::utils::{build_redirect_chain_simple, is_probably_html, now_iso, pick_header, truncate};
use tokio::time::timeout;
use url::Url;

/// Warnings and page errors are cut to this many characters
const MESSAGE_MAX_LEN: usize = 500;

/// Visit counters of one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Homepage and content pages visited
    pub content_visits: u32,
    pub special_file_visits: u32,
    /// Dequeued entries dropped because their budget was spent
    pub skipped_over_budget: u32,
}

/// Everything a crawl produced, before assembly into the run document
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub home: Option<HomeSnapshot>,
    pub files: SpecialFilesBlock,
    pub pages: Vec<PageRecord>,
    pub warnings: Vec<String>,
    /// Set when the run aborted; pages are empty then
    pub fatal: Option<String>,
    pub stats: CrawlStats,
}

/// Reason a run cannot continue
#[derive(Debug)]
struct Abort(String);

impl Abort {
    fn browser(error: &BrowserError) -> Self {
        Abort(format!("browser-unavailable: {error}"))
    }
}

/// Drives one snapshot crawl through a single browser page.
///
/// The homepage is always visited first. Its failure aborts the run; content page failures
/// only produce an errored [`PageRecord`] and a warning.
pub struct SiteCrawler<'a> {
    config: &'a RunConfig,
    page: &'a dyn BrowserPage,
    store: &'a dyn BlobStore,
    link_filter: LinkFilter,
    frontier: Frontier,
    resolver: SpecialFileResolver,
    home: Option<HomeSnapshot>,
    pages: Vec<PageRecord>,
    warnings: Vec<String>,
    stats: CrawlStats,
}

impl<'a> SiteCrawler<'a> {
    pub fn new(config: &'a RunConfig, page: &'a dyn BrowserPage, store: &'a dyn BlobStore) -> Self {
        let link_filter = LinkFilter::for_domain(&config.base_domain).expect("built-in link patterns are valid");
        Self {
            config,
            page,
            store,
            link_filter,
            frontier: Frontier::new(),
            resolver: SpecialFileResolver::new(),
            home: None,
            pages: Vec::new(),
            warnings: Vec::new(),
            stats: CrawlStats::default(),
        }
    }

    /// Runs the crawl until the frontier is drained, both budgets are spent, or the run aborts.
    pub async fn run(mut self) -> CrawlOutcome {
        ::log::info!(
            "Starting snapshot of {} for hotel {} (max {} pages, depth {})",
            self.config.home_url,
            self.config.hotel_id,
            self.config.max_pages,
            self.config.max_depth
        );

        let fatal = if self.config.take_home_mobile_screenshot {
            self.frontier
                .enqueue(FrontierEntry::home(&self.config.home_url), Priority::Back);
            self.drain().await.err()
        } else {
            Some(Abort("home-screenshot-disabled".to_string()))
        };

        if let Some(Abort(reason)) = &fatal {
            ::log::error!("Snapshot of {} failed: {}", self.config.home_url, reason);
            self.frontier.clear();
            self.pages.clear();
        } else {
            ::log::info!(
                "Snapshot of {} finished: {} pages, {} special files, {} skipped",
                self.config.home_url,
                self.stats.content_visits,
                self.stats.special_file_visits,
                self.stats.skipped_over_budget
            );
        }

        CrawlOutcome {
            home: self.home,
            files: self.resolver.into_files(),
            pages: self.pages,
            warnings: self.warnings,
            fatal: fatal.map(|Abort(reason)| reason),
            stats: self.stats,
        }
    }

    async fn drain(&mut self) -> Result<(), Abort> {
        while let Some(entry) = self.frontier.dequeue() {
            if !self.claim_budget(&entry.kind) {
                self.stats.skipped_over_budget += 1;
                ::log::debug!("Budget spent, skipping {}", entry.url);
                continue;
            }

            let handled = timeout(self.config.request_timeout, self.visit(&entry)).await;
            match handled {
                Ok(result) => result?,
                Err(_) => self.handler_timed_out(&entry)?,
            }

            if self.budgets_spent() {
                self.stats.skipped_over_budget += self.frontier.len() as u32;
                self.frontier.clear();
            }
        }
        Ok(())
    }

    fn claim_budget(&mut self, kind: &RequestKind) -> bool {
        let (used, limit) = match kind {
            RequestKind::SpecialFile(_) => (&mut self.stats.special_file_visits, SPECIAL_FILE_BUDGET),
            RequestKind::Home | RequestKind::Content { .. } => (&mut self.stats.content_visits, self.config.max_pages),
        };
        if *used >= limit {
            return false;
        }
        *used += 1;
        true
    }

    fn budgets_spent(&self) -> bool {
        self.stats.content_visits >= self.config.max_pages && self.stats.special_file_visits >= SPECIAL_FILE_BUDGET
    }

    async fn visit(&mut self, entry: &FrontierEntry) -> Result<(), Abort> {
        match entry.kind {
            RequestKind::Home => self.visit_home(entry).await,
            RequestKind::Content { depth, is_seed } => self.visit_content(entry, depth, is_seed).await,
            RequestKind::SpecialFile(kind) => self.visit_special(entry, kind).await,
        }
    }

    fn handler_timed_out(&mut self, entry: &FrontierEntry) -> Result<(), Abort> {
        let message = format!(
            "request handler timed out after {} ms",
            self.config.request_timeout.as_millis()
        );
        ::log::warn!("{}: {}", entry.url, message);
        match entry.kind {
            RequestKind::Home => Err(Abort(format!("home-failed: {}: {}", entry.url, message))),
            RequestKind::Content { depth, .. } => {
                self.record_failure(&entry.url, depth, now_iso(), None, message);
                Ok(())
            }
            RequestKind::SpecialFile(kind) => {
                self.resolve_special(kind, &entry.url, SpecialFetch::Failed(message));
                Ok(())
            }
        }
    }

    async fn visit_home(&mut self, entry: &FrontierEntry) -> Result<(), Abort> {
        let started_at = now_iso();
        ::log::info!("Visiting homepage {}", entry.url);

        let response = self
            .page
            .navigate(&entry.url, self.config.navigation_timeout)
            .await
            .map_err(|e| Abort(format!("home-failed: {}: {}", entry.url, e)))?;
        if !response.is_success() {
            return Err(Abort(format!(
                "home-failed: {}: HTTP {}",
                entry.url,
                status_label(response.status)
            )));
        }

        let final_url = resolved_url(&response, &entry.url);
        let is_html = is_probably_html(content_type(&response));
        let html = if is_html {
            self.read_html().await?
        } else {
            None
        };

        let visit = HomeVisit {
            url: entry.url.clone(),
            final_url: Some(final_url.clone()),
            status: response.status,
            redirect_chain: build_redirect_chain_simple(&entry.url, Some(&final_url), response.status),
            started_at: started_at.clone(),
            html_missing: is_html && self.config.store_html && html.is_none(),
        };
        let snapshot = capture_home(self.page, self.store, self.config, visit)
            .await
            .map_err(|e| Abort(format!("home-capture-failed: {e}")))?;
        self.home = Some(snapshot);

        let record = self.page_record(&entry.url, 0, started_at, Some(&response), html.clone());
        self.pages.push(record);

        let home_url = Url::parse(&final_url)
            .or_else(|_| Url::parse(&entry.url))
            .map_err(|e| Abort(format!("home-failed: {}: {}", entry.url, e)))?;

        let specials = self.resolver.activate(&home_url, &mut self.frontier);
        ::log::debug!("Queued {} special files", specials.len());

        let config = self.config;
        for seed in &config.extra_seed_urls {
            self.frontier.enqueue(FrontierEntry::seed(seed), Priority::Back);
        }

        if config.max_depth > 0 {
            if let Some(html) = &html {
                self.discover_links(&home_url, html, 1);
            }
        }
        Ok(())
    }

    async fn visit_content(&mut self, entry: &FrontierEntry, depth: u32, is_seed: bool) -> Result<(), Abort> {
        let started_at = now_iso();
        if is_seed {
            ::log::info!("Visiting seed {}", entry.url);
        } else {
            ::log::info!("Visiting {} (depth {})", entry.url, depth);
        }

        let response = match self.navigate_with_retries(&entry.url).await {
            Ok(response) => response,
            Err(e) if e.is_unrecoverable() => return Err(Abort::browser(&e)),
            Err(e) => {
                self.record_failure(&entry.url, depth, started_at, None, e.to_string());
                return Ok(());
            }
        };
        if !response.is_success() {
            let message = format!("HTTP {}", status_label(response.status));
            self.record_failure(&entry.url, depth, started_at, Some(&response), message);
            return Ok(());
        }

        let follow_links = depth < self.config.max_depth;
        let html = if is_probably_html(content_type(&response)) {
            self.read_html().await?
        } else {
            None
        };

        if follow_links {
            if let (Some(html), Ok(page_url)) = (&html, Url::parse(&resolved_url(&response, &entry.url))) {
                self.discover_links(&page_url, html, depth + 1);
            }
        }

        let record = self.page_record(&entry.url, depth, started_at, Some(&response), html);
        self.pages.push(record);
        Ok(())
    }

    async fn visit_special(&mut self, entry: &FrontierEntry, kind: SpecialFileKind) -> Result<(), Abort> {
        ::log::debug!("Fetching {} from {}", kind, entry.url);

        let fetch = match self.page.navigate(&entry.url, self.config.navigation_timeout).await {
            Err(e) if e.is_unrecoverable() => return Err(Abort::browser(&e)),
            Err(e) => SpecialFetch::Failed(e.to_string()),
            Ok(response) if !response.is_success() => SpecialFetch::Fetched {
                status: response.status,
                final_url: response.final_url,
                body: String::new(),
            },
            Ok(response) => match self.page.body_text().await {
                Ok(body) => SpecialFetch::Fetched {
                    status: response.status,
                    final_url: response.final_url,
                    body,
                },
                Err(e) if e.is_unrecoverable() => return Err(Abort::browser(&e)),
                Err(e) => SpecialFetch::Failed(e.to_string()),
            },
        };

        self.resolve_special(kind, &entry.url, fetch);
        Ok(())
    }

    fn resolve_special(&mut self, kind: SpecialFileKind, url: &str, fetch: SpecialFetch) {
        let resolution = self.resolver.handle(kind, url, fetch, &mut self.frontier);
        for warning in resolution.warnings {
            self.warn(warning);
        }
        for follow_up in &resolution.follow_ups {
            ::log::debug!("Queued {} from {}", follow_up.url, url);
        }
    }

    /// Navigates, retrying recoverable failures up to the configured count.
    async fn navigate_with_retries(&self, url: &str) -> Result<NavigationResponse, BrowserError> {
        let mut attempt = 0;
        loop {
            match self.page.navigate(url, self.config.navigation_timeout).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_unrecoverable() || attempt >= self.config.max_request_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    ::log::warn!(
                        "Retrying {} ({}/{}): {}",
                        url,
                        attempt,
                        self.config.max_request_retries,
                        e
                    );
                }
            }
        }
    }

    /// Serialized DOM of the current page; a recoverable read failure yields `None`.
    async fn read_html(&self) -> Result<Option<String>, Abort> {
        match self.page.content().await {
            Ok(html) => Ok(Some(html)),
            Err(e) if e.is_unrecoverable() => Err(Abort::browser(&e)),
            Err(e) => {
                ::log::debug!("Could not read page content: {}", e);
                Ok(None)
            }
        }
    }

    fn discover_links(&mut self, page_url: &Url, html: &str, depth: u32) {
        let base = base_href(html)
            .and_then(|href| page_url.join(&href).ok())
            .unwrap_or_else(|| page_url.clone());

        let mut queued = 0;
        for href in parse_links(html) {
            if let Some(url) = self.link_filter.accept(&base, &href) {
                if self.frontier.enqueue(FrontierEntry::link(url.as_str(), depth), Priority::Back) {
                    queued += 1;
                }
            }
        }
        ::log::debug!("Queued {} new links at depth {} from {}", queued, depth, page_url);
    }

    fn page_record(
        &self,
        url: &str,
        depth: u32,
        started_at: String,
        response: Option<&NavigationResponse>,
        html: Option<String>,
    ) -> PageRecord {
        let final_url = response.map(|r| resolved_url(r, url));
        let status = response.and_then(|r| r.status);
        let outbound = match (&html, Url::parse(final_url.as_deref().unwrap_or(url))) {
            (Some(html), Ok(page_url)) => {
                let base = base_href(html)
                    .and_then(|href| page_url.join(&href).ok())
                    .unwrap_or(page_url);
                outbound_domains(html, &base, &self.config.base_domain)
            }
            _ => Vec::new(),
        };
        PageRecord {
            url: url.to_string(),
            redirect_chain: build_redirect_chain_simple(url, final_url.as_deref(), status),
            final_url,
            status,
            content_type: response.and_then(content_type).map(str::to_string),
            started_at,
            finished_at: now_iso(),
            depth,
            html: html.filter(|_| self.config.store_html),
            headers: response
                .filter(|_| self.config.store_headers)
                .map(|r| r.headers.clone()),
            error: None,
            error_code: None,
            timings: response.and_then(|r| r.timings),
            outbound_domains: outbound,
        }
    }

    fn record_failure(
        &mut self,
        url: &str,
        depth: u32,
        started_at: String,
        response: Option<&NavigationResponse>,
        message: String,
    ) {
        let code = ErrorCode::classify(response.and_then(|r| r.status), &message);
        self.warn(format!("request-failed: {}: {}: {}", url, code.as_str(), message));

        let mut record = self.page_record(url, depth, started_at, response, None);
        record.error = Some(truncate(&message, MESSAGE_MAX_LEN));
        record.error_code = Some(code);
        self.pages.push(record);
    }

    fn warn(&mut self, warning: String) {
        ::log::warn!("{}", warning);
        self.warnings.push(truncate(&warning, MESSAGE_MAX_LEN));
    }
}

fn content_type(response: &NavigationResponse) -> Option<&str> {
    pick_header(Some(&response.headers), "content-type")
}

fn resolved_url(response: &NavigationResponse, requested: &str) -> String {
    if response.final_url.is_empty() {
        requested.to_string()
    } else {
        response.final_url.clone()
    }
}

fn status_label(status: Option<u16>) -> String {
    status.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}
