//! The browser capability the crawl is driven through.
//!
//! The orchestrator only ever talks to a [`BrowserPage`]; [`webdriver::WebDriverPage`] is the
//! production implementation on top of a WebDriver session.

pub mod webdriver;

use crate::error::BrowserError;
use crate::results::PageTimings;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main-document response of a navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationResponse {
    /// HTTP status of the main document, when the driver can tell
    pub status: Option<u16>,
    /// URL after redirects
    pub final_url: String,
    pub headers: BTreeMap<String, String>,
    /// Navigation Timing of the main document, when the driver reports it
    pub timings: Option<PageTimings>,
}

impl NavigationResponse {
    /// Whether the status counts as a usable response (2xx or 3xx).
    ///
    /// A missing status is treated as success, as drivers that cannot report it only get here
    /// once the document loaded.
    pub fn is_success(&self) -> bool {
        match self.status {
            Some(s) => (200..400).contains(&s),
            None => true,
        }
    }
}

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementQuery {
    /// A CSS selector
    Css(String),
    /// A `<button>` whose visible text contains the given phrase
    ButtonText(String),
}

impl ElementQuery {
    pub fn css(selector: &str) -> Self {
        ElementQuery::Css(selector.to_string())
    }

    pub fn button_text(text: &str) -> Self {
        ElementQuery::ButtonText(text.to_string())
    }

    /// Human-readable form used in logs and consent entries
    pub fn describe(&self) -> String {
        match self {
            ElementQuery::Css(selector) => selector.clone(),
            ElementQuery::ButtonText(text) => format!("button:has-text(\"{text}\")"),
        }
    }
}

/// A single rendered page in a live browser.
///
/// Implementations are driven by one worker at a time; every call observes the state left by
/// the previous one.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Loads `url` and waits for the document to be ready.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<NavigationResponse, BrowserError>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Raw textual body of the current document, for plain-text and XML responses.
    async fn body_text(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// Attribute of the first element matching a CSS selector.
    async fn query_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>, BrowserError>;

    /// PNG screenshot of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// Runs a script and returns its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    async fn wait(&self, ms: u64);

    async fn scroll_to_top(&self) -> Result<(), BrowserError>;

    async fn scroll_by(&self, dy: i64) -> Result<(), BrowserError>;

    /// Number of elements matching the query.
    async fn locator_count(&self, query: &ElementQuery) -> Result<usize, BrowserError>;

    /// Clicks the first element matching the query, giving up after `timeout`.
    async fn click(&self, query: &ElementQuery, timeout: Duration) -> Result<(), BrowserError>;
}
