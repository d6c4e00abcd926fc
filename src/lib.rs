// Re-export modules
pub mod browser;
pub mod capture;
pub mod config;
pub mod consent;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod frontier;
pub mod output;
pub mod parsers;
pub mod results;
pub mod special_files;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use browser::BrowserPage;
pub use config::{CaptureSettings, RunConfig, RunInput};
pub use error::SnapshotError;
pub use results::{RunOutput, RunStatus};
pub use store::{BlobStore, Dataset};

use crawlers::SiteCrawler;
use utils::now_iso;

/// Main builder for a hotel-site snapshot run
pub struct Snapshot {
    config: RunConfig,
}

impl Snapshot {
    /// Create a builder from raw input, validating and normalizing it
    pub fn new(input: &RunInput) -> Result<Self, SnapshotError> {
        Ok(Self {
            config: RunConfig::from_input(input)?,
        })
    }

    /// Load input from a JSON file
    pub fn from_input_file(path: impl AsRef<std::path::Path>) -> Result<Self, SnapshotError> {
        let input = RunInput::from_file(path)?;
        Self::new(&input)
    }

    /// Replace the homepage capture timings
    pub fn with_capture(mut self, capture: CaptureSettings) -> Self {
        self.config = self.config.with_capture(capture);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Crawl through `page`, then store the run document in `store` and `dataset`.
    ///
    /// Crawl failures end up in the document with status `failed`; only a failure to persist
    /// the document is returned as an error.
    pub async fn run(
        &self,
        page: &dyn BrowserPage,
        store: &dyn BlobStore,
        dataset: &dyn Dataset,
    ) -> Result<RunOutput, SnapshotError> {
        let started_at = now_iso();
        let outcome = SiteCrawler::new(&self.config, page, store).run().await;
        let output = output::assemble(&self.config, started_at, outcome);
        output::persist(&output, store, dataset).await?;
        Ok(output)
    }

    /// Store a failed document for a run whose browser could not be started.
    pub async fn record_failure(
        &self,
        reason: &str,
        store: &dyn BlobStore,
        dataset: &dyn Dataset,
    ) -> Result<RunOutput, SnapshotError> {
        let output = output::failed_before_crawl(&self.config, now_iso(), reason);
        output::persist(&output, store, dataset).await?;
        Ok(output)
    }
}
