use crate::error::ConfigError;
use crate::utils::{clamp_int, ensure_https_url, normalize_domain_to_home_url, uniq_strings};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Raw run input, as loaded from JSON or assembled by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    /// Hotel identifier used to join the snapshot with other records
    #[serde(default)]
    pub hotel_id: String,

    /// Hotel website domain, with or without scheme
    #[serde(default)]
    pub domain: String,

    /// Extra starting URLs; the homepage is always added
    #[serde(default)]
    pub seed_urls: Vec<String>,

    /// Maximum number of content pages to visit (including the homepage)
    #[serde(default = "default_max_pages")]
    pub max_pages: i64,

    /// Maximum link depth from the seeds (0 = seeds only)
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,

    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: i64,

    /// Navigation retries for content pages
    #[serde(default)]
    pub max_request_retries: i64,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub store_html: bool,

    #[serde(default = "default_true")]
    pub store_headers: bool,

    #[serde(default = "default_true")]
    pub take_home_mobile_screenshot: bool,

    #[serde(default = "default_true")]
    pub try_dismiss_consent: bool,

    #[serde(default)]
    pub home_mobile_viewport: Option<ViewportOverrides>,

    /// Free-form tags echoed into the output metadata
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub debug: bool,
}

/// Mobile viewport used to render the homepage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub is_landscape: bool,
    pub user_agent: String,
}

/// Partial viewport overrides merged over [`Viewport::default`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub device_scale_factor: Option<f64>,
    pub is_mobile: Option<bool>,
    pub has_touch: Option<bool>,
    pub is_landscape: Option<bool>,
    pub user_agent: Option<String>,
}

/// Timings of the homepage capture sequence
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Render-stabilization wait before polling media
    pub settle_ms: u64,
    pub media_timeout_ms: u64,
    pub media_poll_ms: u64,
    /// Fraction of the viewport height scrolled before the second screenshot
    pub scroll_ratio: f64,
    pub post_scroll_settle_ms: u64,
    pub consent_click_timeout_ms: u64,
}

/// WebDriver connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverSettings {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Tried in order when `webdriver_url` refuses the session
    #[serde(default = "default_fallback_urls")]
    pub fallback_urls: Vec<String>,
}

/// Normalized, clamped configuration for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub hotel_id: String,
    /// Domain exactly as provided
    pub domain: String,
    /// Registrable host used for same-domain checks (no `www.` prefix)
    pub base_domain: String,
    pub home_url: String,
    /// Seeds other than the homepage, deduplicated
    pub extra_seed_urls: Vec<String>,
    pub max_pages: u32,
    pub max_depth: u32,
    pub max_requests_per_minute: u32,
    pub max_request_retries: u32,
    pub navigation_timeout: Duration,
    pub request_timeout: Duration,
    pub store_html: bool,
    pub store_headers: bool,
    pub take_home_mobile_screenshot: bool,
    pub try_dismiss_consent: bool,
    pub viewport: Viewport,
    pub tags: Vec<String>,
    pub debug: bool,
    pub capture: CaptureSettings,
}

fn default_max_pages() -> i64 {
    25
}

fn default_max_depth() -> i64 {
    1
}

fn default_max_requests_per_minute() -> i64 {
    60
}

fn default_navigation_timeout_ms() -> u64 {
    45_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_fallback_urls() -> Vec<String> {
    vec![
        "http://localhost:9515".to_string(), // ChromeDriver default
        "http://127.0.0.1:4444".to_string(),
    ]
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 390,
            height: 844,
            device_scale_factor: 2.0,
            is_mobile: true,
            has_touch: true,
            is_landscape: false,
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1".to_string(),
        }
    }
}

impl Viewport {
    /// Applies partial overrides on top of this viewport
    pub fn merged(mut self, overrides: Option<&ViewportOverrides>) -> Self {
        let Some(o) = overrides else {
            return self;
        };
        if let Some(w) = o.width {
            self.width = w;
        }
        if let Some(h) = o.height {
            self.height = h;
        }
        if let Some(dsf) = o.device_scale_factor {
            self.device_scale_factor = dsf;
        }
        if let Some(m) = o.is_mobile {
            self.is_mobile = m;
        }
        if let Some(t) = o.has_touch {
            self.has_touch = t;
        }
        if let Some(l) = o.is_landscape {
            self.is_landscape = l;
        }
        if let Some(ua) = &o.user_agent {
            self.user_agent = ua.clone();
        }
        self
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            settle_ms: 3_000,
            media_timeout_ms: 5_000,
            media_poll_ms: 250,
            scroll_ratio: 0.9,
            post_scroll_settle_ms: 800,
            consent_click_timeout_ms: 1_500,
        }
    }
}

impl CaptureSettings {
    /// No waits at all; useful when driving a scripted page
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            media_timeout_ms: 0,
            media_poll_ms: 0,
            scroll_ratio: 0.9,
            post_scroll_settle_ms: 0,
            consent_click_timeout_ms: 0,
        }
    }
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            fallback_urls: default_fallback_urls(),
        }
    }
}

impl WebDriverSettings {
    /// Defaults, with the WebDriver URL overridden by `WEBDRIVER_URL` when set
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            if !url.is_empty() {
                settings.webdriver_url = url;
            }
        }
        settings
    }
}

impl Default for RunInput {
    fn default() -> Self {
        Self {
            hotel_id: String::new(),
            domain: String::new(),
            seed_urls: Vec::new(),
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            max_requests_per_minute: default_max_requests_per_minute(),
            max_request_retries: 0,
            navigation_timeout_ms: default_navigation_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            store_html: true,
            store_headers: true,
            take_home_mobile_screenshot: true,
            try_dismiss_consent: true,
            home_mobile_viewport: None,
            tags: Vec::new(),
            debug: false,
        }
    }
}

impl RunInput {
    /// Minimal input for a hotel and domain, everything else defaulted
    pub fn new(hotel_id: &str, domain: &str) -> Self {
        Self {
            hotel_id: hotel_id.to_string(),
            domain: domain.to_string(),
            ..Self::default()
        }
    }

    /// Load input from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Load input from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl RunConfig {
    /// Validates and normalizes raw input
    pub fn from_input(input: &RunInput) -> Result<Self, ConfigError> {
        let hotel_id = input.hotel_id.trim().to_string();
        if hotel_id.is_empty() {
            return Err(ConfigError::MissingHotelId);
        }
        let domain = input.domain.trim().to_string();
        if domain.is_empty() {
            return Err(ConfigError::MissingDomain);
        }

        let home_url = normalize_domain_to_home_url(&domain);
        let parsed = Url::parse(&home_url).map_err(|e| ConfigError::InvalidHomeUrl {
            domain: domain.clone(),
            reason: e.to_string(),
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidHomeUrl {
                domain: domain.clone(),
                reason: "no host".to_string(),
            })?
            .to_ascii_lowercase();
        let base_domain = host.strip_prefix("www.").unwrap_or(&host).to_string();

        let extra_seed_urls = uniq_strings(&input.seed_urls)
            .iter()
            .map(|s| ensure_https_url(s))
            .filter(|s| *s != home_url)
            .collect::<Vec<_>>();
        let extra_seed_urls = uniq_strings(extra_seed_urls);

        Ok(Self {
            hotel_id,
            domain,
            base_domain,
            home_url,
            extra_seed_urls,
            max_pages: clamp_int(input.max_pages, 1, 500) as u32,
            max_depth: clamp_int(input.max_depth, 0, 25) as u32,
            max_requests_per_minute: clamp_int(input.max_requests_per_minute, 1, 6000) as u32,
            max_request_retries: clamp_int(input.max_request_retries, 0, 5) as u32,
            navigation_timeout: Duration::from_millis(input.navigation_timeout_ms.max(1)),
            request_timeout: Duration::from_millis(input.request_timeout_ms.max(1)),
            store_html: input.store_html,
            store_headers: input.store_headers,
            take_home_mobile_screenshot: input.take_home_mobile_screenshot,
            try_dismiss_consent: input.try_dismiss_consent,
            viewport: Viewport::default().merged(input.home_mobile_viewport.as_ref()),
            tags: uniq_strings(&input.tags),
            debug: input.debug,
            capture: CaptureSettings::default(),
        })
    }

    /// Replace the capture timings
    pub fn with_capture(mut self, capture: CaptureSettings) -> Self {
        self.capture = capture;
        self
    }
}
