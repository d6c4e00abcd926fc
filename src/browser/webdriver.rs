use super::{BrowserPage, ElementQuery, NavigationResponse};
use crate::config::{Viewport, WebDriverSettings};
use crate::error::BrowserError;
use crate::results::PageTimings;
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;

const DOCUMENT_INFO_SCRIPT: &str = r#"
const nav = performance.getEntriesByType('navigation')[0];
const since = (t) => (nav && t > 0 ? Math.round(t - nav.startTime) : null);
return {
  status: nav && nav.responseStatus ? nav.responseStatus : null,
  contentType: document.contentType || null,
  timings: nav ? {
    htmlMs: since(nav.responseEnd),
    domContentLoadedMs: since(nav.domContentLoadedEventEnd),
    loadMs: since(nav.loadEventEnd)
  } : null
};
"#;

const BODY_TEXT_SCRIPT: &str = r#"
const ct = (document.contentType || '').toLowerCase();
if (ct.includes('xml')) return new XMLSerializer().serializeToString(document);
if (document.body) return document.body.innerText;
return document.documentElement ? document.documentElement.textContent : '';
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentInfo {
    status: Option<u16>,
    content_type: Option<String>,
    timings: Option<PageTimings>,
}

/// [`BrowserPage`] backed by a WebDriver session with Chrome mobile emulation.
pub struct WebDriverPage {
    client: Client,
    /// Minimum spacing between navigations, derived from the requests-per-minute budget
    min_interval: Duration,
    last_navigation: Mutex<Option<Instant>>,
}

impl WebDriverPage {
    /// Opens a session on the configured WebDriver, falling back to the alternative URLs.
    pub async fn connect(
        settings: &WebDriverSettings,
        viewport: &Viewport,
        max_requests_per_minute: u32,
    ) -> Result<Self, BrowserError> {
        let client = connect_to_webdriver(settings, viewport).await?;

        if let Err(e) = client.set_window_size(viewport.width, viewport.height).await {
            ::log::debug!("Could not size window to viewport: {}", e);
        }

        Ok(Self {
            client,
            min_interval: Duration::from_millis(60_000 / u64::from(max_requests_per_minute.max(1))),
            last_navigation: Mutex::new(None),
        })
    }

    /// Ends the WebDriver session.
    pub async fn close(self) {
        if let Err(e) = self.client.close().await {
            ::log::warn!("Failed to close WebDriver session: {}", e);
        }
    }

    async fn throttle(&self) {
        let mut last = self.last_navigation.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn find(&self, query: &ElementQuery) -> Result<Vec<fantoccini::elements::Element>, BrowserError> {
        let result = match query {
            ElementQuery::Css(selector) => self.client.find_all(Locator::Css(selector.as_str())).await,
            ElementQuery::ButtonText(text) => {
                let xpath = button_text_xpath(text);
                self.client.find_all(Locator::XPath(&xpath)).await
            }
        };
        result.map_err(|e| classify(e, BrowserError::Element))
    }

    async fn click_first(&self, query: &ElementQuery) -> Result<(), BrowserError> {
        let elements = self.find(query).await?;
        let element = elements
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::Element(format!("no element for {}", query.describe())))?;
        element.click().await.map_err(|e| classify(e, BrowserError::Element))
    }
}

/// Chrome capabilities emulating the mobile viewport
fn mobile_capabilities(settings: &WebDriverSettings, viewport: &Viewport) -> serde_json::Map<String, Value> {
    let mut args = vec!["--disable-gpu".to_string(), "--no-sandbox".to_string()];
    if settings.headless {
        args.push("--headless=new".to_string());
    }

    let caps = json!({
        "browserName": "chrome",
        "goog:chromeOptions": {
            "args": args,
            "mobileEmulation": {
                "deviceMetrics": {
                    "width": viewport.width,
                    "height": viewport.height,
                    "pixelRatio": viewport.device_scale_factor,
                    "mobile": viewport.is_mobile,
                    "touch": viewport.has_touch,
                },
                "userAgent": viewport.user_agent,
            }
        }
    });

    match caps {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Connects to the WebDriver instance
async fn connect_to_webdriver(settings: &WebDriverSettings, viewport: &Viewport) -> Result<Client, BrowserError> {
    let caps = mobile_capabilities(settings, viewport);

    let mut candidates = vec![settings.webdriver_url.as_str()];
    candidates.extend(
        settings
            .fallback_urls
            .iter()
            .map(String::as_str)
            .filter(|u| *u != settings.webdriver_url),
    );

    let mut last_error = String::from("no WebDriver URL configured");
    for url in candidates {
        let mut builder = ClientBuilder::native();
        builder.capabilities(caps.clone());
        match builder.connect(url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", url);
                return Ok(client);
            }
            Err(e) => {
                ::log::warn!("Failed to connect to WebDriver at {}: {}", url, e);
                last_error = e.to_string();
            }
        }
    }

    ::log::error!("Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable");
    Err(BrowserError::Connect(last_error))
}

fn is_session_lost(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("unable to find session")
        || m.contains("invalid session id")
        || m.contains("no such window")
        || m.contains("connection to the webdriver server was lost")
}

/// Maps a WebDriver command error, promoting lost sessions to [`BrowserError::SessionLost`]
fn classify(error: CmdError, wrap: fn(String) -> BrowserError) -> BrowserError {
    let message = error.to_string();
    if is_session_lost(&message) {
        BrowserError::SessionLost(message)
    } else {
        wrap(message)
    }
}

/// Quotes a string as an XPath 1.0 literal.
fn xpath_literal(s: &str) -> String {
    if !s.contains('"') {
        format!("\"{s}\"")
    } else if !s.contains('\'') {
        format!("'{s}'")
    } else {
        let parts = s
            .split('"')
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", '\"', ");
        format!("concat({parts})")
    }
}

/// Upper-case letters folded by `translate()`, position-aligned with [`LOWER_CASE`]
const UPPER_CASE: &str = concat!(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "ÀÁÂÃÄÅÆÇÈÉÊËÌÍÎÏÑÒÓÔÕÖØÙÚÛÜÝ",
    "АБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯ",
);
const LOWER_CASE: &str = concat!(
    "abcdefghijklmnopqrstuvwxyz",
    "àáâãäåæçèéêëìíîïñòóôõöøùúûüý",
    "абвгдеёжзийклмнопрстуфхцчшщъыьэюя",
);

/// XPath 1.0 has no `lower-case()`, so both sides are folded with `translate()`.
fn button_text_xpath(text: &str) -> String {
    format!(
        "//button[contains(translate(normalize-space(.), {}, {}), {})]",
        xpath_literal(UPPER_CASE),
        xpath_literal(LOWER_CASE),
        xpath_literal(&text.to_lowercase())
    )
}

#[async_trait]
impl BrowserPage for WebDriverPage {
    async fn navigate(&self, url: &str, limit: Duration) -> Result<NavigationResponse, BrowserError> {
        self.throttle().await;
        ::log::debug!("GOTO: {}", url);

        match timeout(limit, self.client.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(classify(e, BrowserError::Navigation)),
            Err(_) => return Err(BrowserError::Timeout(limit.as_millis() as u64)),
        }

        let final_url = self
            .client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(|e| classify(e, BrowserError::Navigation))?;

        let info = self
            .client
            .execute(DOCUMENT_INFO_SCRIPT, vec![])
            .await
            .map_err(|e| classify(e, BrowserError::Script))?;
        let info: DocumentInfo = serde_json::from_value(info).unwrap_or_default();

        // WebDriver does not expose response headers; the document content type is the one we can see
        let mut headers = BTreeMap::new();
        if let Some(ct) = info.content_type {
            headers.insert("content-type".to_string(), ct);
        }

        Ok(NavigationResponse {
            status: info.status,
            final_url,
            headers,
            timings: info.timings.filter(|t| !t.is_empty()),
        })
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.client.source().await.map_err(|e| classify(e, BrowserError::Script))
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        let value = self
            .client
            .execute(BODY_TEXT_SCRIPT, vec![])
            .await
            .map_err(|e| classify(e, BrowserError::Script))?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        self.client.title().await.map_err(|e| classify(e, BrowserError::Script))
    }

    async fn query_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>, BrowserError> {
        let elements = self.find(&ElementQuery::css(selector)).await?;
        match elements.first() {
            Some(element) => element.attr(attr).await.map_err(|e| classify(e, BrowserError::Element)),
            None => Ok(None),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.client.screenshot().await.map_err(|e| classify(e, BrowserError::Script))
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(|e| classify(e, BrowserError::Script))
    }

    async fn wait(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    async fn scroll_to_top(&self) -> Result<(), BrowserError> {
        self.evaluate("window.scrollTo(0, 0); return null;").await.map(|_| ())
    }

    async fn scroll_by(&self, dy: i64) -> Result<(), BrowserError> {
        self.evaluate(&format!("window.scrollBy(0, {dy}); return null;"))
            .await
            .map(|_| ())
    }

    async fn locator_count(&self, query: &ElementQuery) -> Result<usize, BrowserError> {
        Ok(self.find(query).await?.len())
    }

    async fn click(&self, query: &ElementQuery, limit: Duration) -> Result<(), BrowserError> {
        match timeout(limit, self.click_first(query)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(limit.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("Accept"), "\"Accept\"");
        assert_eq!(xpath_literal("J'accepte"), "\"J'accepte\"");
        assert_eq!(xpath_literal("say \"hi\""), "'say \"hi\"'");
        assert_eq!(
            xpath_literal("a\"b'c"),
            "concat(\"a\", '\"', \"b'c\")"
        );
    }

    #[test]
    fn test_case_alphabets_align() {
        let upper: Vec<char> = UPPER_CASE.chars().collect();
        let lower: Vec<char> = LOWER_CASE.chars().collect();
        assert_eq!(upper.len(), lower.len());
        for (u, l) in upper.iter().zip(&lower) {
            assert_eq!(u.to_lowercase().collect::<String>(), l.to_string(), "{u} does not fold to {l}");
        }
    }

    #[test]
    fn test_button_text_xpath() {
        assert_eq!(
            button_text_xpath("Got it"),
            format!(
                "//button[contains(translate(normalize-space(.), \"{UPPER_CASE}\", \"{LOWER_CASE}\"), \"got it\")]"
            )
        );
    }

    #[test]
    fn test_button_text_xpath_folds_case() {
        // "ACCEPT ALL" and "Accept All" both fold to the phrase's lower-case form
        let xpath = button_text_xpath("Accept all");
        assert!(xpath.contains("translate(normalize-space(.), "));
        assert!(xpath.ends_with(", \"accept all\")]"));

        let xpath = button_text_xpath("Принять все");
        assert!(xpath.ends_with(", \"принять все\")]"));
        assert!(UPPER_CASE.contains('П') && LOWER_CASE.contains('п'));
    }

    #[test]
    fn test_document_info_timings() {
        let info: DocumentInfo = serde_json::from_value(json!({
            "status": 200,
            "contentType": "text/html",
            "timings": {"htmlMs": 182, "domContentLoadedMs": 640, "loadMs": null}
        }))
        .unwrap();
        let timings = info.timings.unwrap();
        assert_eq!(timings.html_ms, Some(182));
        assert_eq!(timings.dom_content_loaded_ms, Some(640));
        assert_eq!(timings.load_ms, None);

        let info: DocumentInfo = serde_json::from_value(json!({"status": null, "timings": null})).unwrap();
        assert!(info.timings.is_none() && info.content_type.is_none());
    }

    #[test]
    fn test_session_lost_detection() {
        assert!(is_session_lost("Unable to find session with ID abc"));
        assert!(is_session_lost("invalid session id"));
        assert!(!is_session_lost("net::ERR_CONNECTION_REFUSED"));
    }

    #[test]
    fn test_mobile_capabilities() {
        let caps = mobile_capabilities(&WebDriverSettings::default(), &Viewport::default());
        let emulation = &caps["goog:chromeOptions"]["mobileEmulation"];
        assert_eq!(emulation["deviceMetrics"]["width"], 390);
        assert_eq!(emulation["deviceMetrics"]["mobile"], true);
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
    }
}
