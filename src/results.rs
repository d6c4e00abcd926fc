use crate::config::Viewport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall status of a snapshot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Failed,
}

/// One hop of a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectHop {
    /// The requested URL at this hop
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Redirect target, if this hop redirected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Final resolved URL of the chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
}

/// Kind of action tried while dismissing a consent banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsentActionType {
    Click,
    Wait,
    PressKey,
    Scroll,
}

/// One attempted consent-dismissal action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentLogEntry {
    pub at: String,

    #[serde(rename = "type")]
    pub action: ConsentActionType,

    pub label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_match: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of visiting one content URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// URL as requested
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    pub redirect_chain: Vec<RedirectHop>,

    pub started_at: String,

    pub finished_at: String,

    /// Depth from the homepage (0 for seeds)
    pub depth: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<PageTimings>,

    /// External hosts the page links to or loads from, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbound_domains: Vec<String>,
}

/// Load timings of the main document from Navigation Timing, in milliseconds since navigation start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTimings {
    /// Last byte of the HTML received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_content_loaded_ms: Option<u64>,

    /// Load event finished, so images and other subresources are in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_ms: Option<u64>,
}

impl PageTimings {
    pub fn is_empty(&self) -> bool {
        self.html_ms.is_none() && self.dom_content_loaded_ms.is_none() && self.load_ms.is_none()
    }
}

/// Coarse classification of a failed visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    DnsNotFound,
    TlsError,
    Timeout,
    #[serde(rename = "http-401-403")]
    Http401403,
    #[serde(rename = "http-429")]
    Http429,
    #[serde(rename = "http-5xx")]
    Http5xx,
    TooManyRedirects,
    NavigationFailed,
    JsCrash,
    Unknown,
}

impl ErrorCode {
    /// Classifies a failure from its HTTP status (if any) and error message.
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        match status {
            Some(401) | Some(403) => return ErrorCode::Http401403,
            Some(429) => return ErrorCode::Http429,
            Some(s) if (500..=599).contains(&s) => return ErrorCode::Http5xx,
            _ => {}
        }

        let m = message.to_ascii_lowercase();
        if m.contains("dns")
            || m.contains("name not resolved")
            || m.contains("name_not_resolved")
            || m.contains("enotfound")
        {
            ErrorCode::DnsNotFound
        } else if m.contains("ssl") || m.contains("tls") || m.contains("cert") {
            ErrorCode::TlsError
        } else if m.contains("too many redirects") {
            ErrorCode::TooManyRedirects
        } else if m.contains("timeout") || m.contains("timed out") {
            ErrorCode::Timeout
        } else if m.contains("target closed") || m.contains("page crashed") {
            ErrorCode::JsCrash
        } else if m.contains("net::") || m.contains("navigation") || m.contains("blocked") {
            ErrorCode::NavigationFailed
        } else {
            ErrorCode::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DnsNotFound => "dns-not-found",
            ErrorCode::TlsError => "tls-error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Http401403 => "http-401-403",
            ErrorCode::Http429 => "http-429",
            ErrorCode::Http5xx => "http-5xx",
            ErrorCode::TooManyRedirects => "too-many-redirects",
            ErrorCode::NavigationFailed => "navigation-failed",
            ErrorCode::JsCrash => "js-crash",
            ErrorCode::Unknown => "unknown",
        }
    }
}

/// Visual snapshot of the homepage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeSnapshot {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    pub viewport: Viewport,

    pub started_at: String,

    pub finished_at: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    pub redirect_chain: Vec<RedirectHop>,

    /// Whether consent dismissal was enabled, regardless of what was clicked
    pub consent_attempted: bool,

    pub consent_log: Vec<ConsentLogEntry>,

    /// Screenshot before consent dismissal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_ref_1: Option<String>,

    /// Screenshot after consent dismissal and scroll
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_ref_2: Option<String>,

    pub screenshot_content_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

/// Raw well-known files captured during the run. Absent means not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialFilesBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robots_txt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap_xml: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub llms_txt: Option<String>,
}

impl SpecialFilesBlock {
    pub fn is_empty(&self) -> bool {
        self.robots_txt.is_none() && self.sitemap_xml.is_none() && self.llms_txt.is_none()
    }
}

/// Run counters and echoed settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    pub version: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,

    pub max_pages: u32,

    pub max_depth: u32,

    pub content_visits: u32,

    pub special_file_visits: u32,

    pub skipped_over_budget: u32,
}

/// The terminal document of a snapshot run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub hotel_id: String,

    /// Domain as provided
    pub domain: String,

    pub home_url: String,

    pub status: RunStatus,

    pub started_at: String,

    pub finished_at: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<HomeSnapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<SpecialFilesBlock>,

    /// Crawled content pages; never includes robots/sitemap/llms
    pub pages: Vec<PageRecord>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub meta: RunMeta,
}
