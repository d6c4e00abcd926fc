use thiserror::Error;

/// Errors raised while turning raw input into a [`crate::config::RunConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Input.hotelId is required")]
    MissingHotelId,

    #[error("Input.domain is required")]
    MissingDomain,

    #[error("home URL could not be built from domain {domain:?}: {reason}")]
    InvalidHomeUrl { domain: String, reason: String },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse input: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by a [`crate::browser::BrowserPage`] implementation.
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timeout after {0} ms")]
    Timeout(u64),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("element interaction failed: {0}")]
    Element(String),

    /// The browser session is gone; nothing further can be visited.
    #[error("browser session lost: {0}")]
    SessionLost(String),

    #[error("failed to connect to WebDriver: {0}")]
    Connect(String),
}

impl BrowserError {
    /// Whether the error invalidates the whole run rather than a single visit.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, BrowserError::SessionLost(_) | BrowserError::Connect(_))
    }
}

/// Errors from the blob store and dataset sinks.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store lock poisoned while writing {key}")]
    Poisoned { key: String },
}

/// A best-effort extraction step that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("{step}:timeout")]
    Timeout { step: &'static str },

    #[error("{step}:missing")]
    Missing { step: &'static str },

    #[error("{step}:{reason}")]
    Failed { step: &'static str, reason: String },
}

impl ExtractionError {
    /// Renders the error the way it is recorded in snapshot notes.
    pub fn note(&self) -> String {
        self.to_string()
    }
}

/// Top-level error for a snapshot run that could not produce or persist its document.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
