//! Assembly and persistence of the terminal run document.

use crate::config::RunConfig;
use crate::crawlers::CrawlOutcome;
use crate::error::StoreError;
use crate::results::{RunMeta, RunOutput, RunStatus};
use crate::store::{BlobStore, Dataset, OUTPUT_KEY};
use crate::utils::now_iso;

const OUTPUT_CONTENT_TYPE: &str = "application/json";

/// Reason recorded when a run ends without a homepage snapshot
pub const MISSING_HOME_ERROR: &str = "home-snapshot-missing";

/// Builds the run document from a finished crawl.
///
/// A run is `ok` only with a homepage snapshot and no fatal error. Failed runs carry no pages,
/// no snapshot and no special files.
pub fn assemble(config: &RunConfig, started_at: String, outcome: CrawlOutcome) -> RunOutput {
    let meta = RunMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        tags: config.tags.clone(),
        max_pages: config.max_pages,
        max_depth: config.max_depth,
        content_visits: outcome.stats.content_visits,
        special_file_visits: outcome.stats.special_file_visits,
        skipped_over_budget: outcome.stats.skipped_over_budget,
    };

    let error = match (&outcome.fatal, &outcome.home) {
        (Some(reason), _) => Some(reason.clone()),
        (None, None) => Some(MISSING_HOME_ERROR.to_string()),
        (None, Some(_)) => None,
    };

    let mut output = RunOutput {
        hotel_id: config.hotel_id.clone(),
        domain: config.domain.clone(),
        home_url: config.home_url.clone(),
        status: RunStatus::Ok,
        started_at,
        finished_at: now_iso(),
        home: None,
        files: None,
        pages: Vec::new(),
        warnings: outcome.warnings,
        error: None,
        meta,
    };

    match error {
        Some(reason) => {
            output.status = RunStatus::Failed;
            output.error = Some(reason);
        }
        None => {
            output.home = outcome.home;
            output.files = Some(outcome.files).filter(|files| !files.is_empty());
            output.pages = outcome.pages;
        }
    }
    output
}

/// Failed document for a run that never reached the crawl, e.g. when no browser was available.
pub fn failed_before_crawl(config: &RunConfig, started_at: String, reason: &str) -> RunOutput {
    let outcome = CrawlOutcome {
        fatal: Some(reason.to_string()),
        ..CrawlOutcome::default()
    };
    assemble(config, started_at, outcome)
}

/// Writes the document to the blob store under [`OUTPUT_KEY`] and appends it to the dataset.
pub async fn persist(output: &RunOutput, store: &dyn BlobStore, dataset: &dyn Dataset) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(output)?;
    let reference = store.put(OUTPUT_KEY, &body, OUTPUT_CONTENT_TYPE).await?;
    ::log::info!("Stored run document at {}", reference);
    dataset.append(output).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunInput, Viewport};
    use crate::crawlers::CrawlStats;
    use crate::results::{HomeSnapshot, PageRecord, SpecialFilesBlock};
    use crate::store::{MemoryBlobStore, MemoryDataset};

    fn config() -> RunConfig {
        let input = RunInput {
            tags: vec!["pilot".to_string()],
            ..RunInput::new("H1", "example.com")
        };
        RunConfig::from_input(&input).unwrap()
    }

    fn home() -> HomeSnapshot {
        HomeSnapshot {
            url: "https://example.com/".to_string(),
            final_url: Some("https://example.com/".to_string()),
            viewport: Viewport::default(),
            started_at: now_iso(),
            finished_at: now_iso(),
            status: Some(200),
            redirect_chain: Vec::new(),
            consent_attempted: true,
            consent_log: Vec::new(),
            screenshot_ref_1: Some("memory:home-mobile-H1-1.png".to_string()),
            screenshot_ref_2: Some("memory:home-mobile-H1-2.png".to_string()),
            screenshot_content_type: "image/png".to_string(),
            title: None,
            meta_description: None,
            notes: Vec::new(),
        }
    }

    fn page(url: &str) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            final_url: None,
            status: Some(200),
            content_type: None,
            redirect_chain: Vec::new(),
            started_at: now_iso(),
            finished_at: now_iso(),
            depth: 0,
            html: None,
            headers: None,
            error: None,
            error_code: None,
            timings: None,
            outbound_domains: Vec::new(),
        }
    }

    fn successful() -> CrawlOutcome {
        CrawlOutcome {
            home: Some(home()),
            files: SpecialFilesBlock {
                robots_txt: Some("User-agent: *".to_string()),
                ..SpecialFilesBlock::default()
            },
            pages: vec![page("https://example.com/")],
            warnings: vec!["sitemap-empty: https://example.com/sitemap.xml".to_string()],
            fatal: None,
            stats: CrawlStats {
                content_visits: 1,
                special_file_visits: 3,
                skipped_over_budget: 0,
            },
        }
    }

    #[test]
    fn test_successful_run() {
        let output = assemble(&config(), now_iso(), successful());
        assert_eq!(output.status, RunStatus::Ok);
        assert!(output.error.is_none());
        assert!(output.home.is_some());
        assert_eq!(output.pages.len(), 1);
        assert_eq!(output.files.as_ref().and_then(|f| f.robots_txt.as_deref()), Some("User-agent: *"));
        assert_eq!(output.meta.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(output.meta.tags, vec!["pilot"]);
        assert_eq!(output.meta.special_file_visits, 3);
    }

    #[test]
    fn test_fatal_run_discards_evidence() {
        let outcome = CrawlOutcome {
            fatal: Some("home-failed: https://example.com/: HTTP 503".to_string()),
            ..successful()
        };
        let output = assemble(&config(), now_iso(), outcome);
        assert_eq!(output.status, RunStatus::Failed);
        assert!(output.pages.is_empty());
        assert!(output.home.is_none());
        assert!(output.files.is_none());
        assert_eq!(output.warnings.len(), 1);
        assert!(output.error.unwrap().contains("503"));
    }

    #[test]
    fn test_missing_home_downgrades_run() {
        let outcome = CrawlOutcome {
            home: None,
            ..successful()
        };
        let output = assemble(&config(), now_iso(), outcome);
        assert_eq!(output.status, RunStatus::Failed);
        assert_eq!(output.error.as_deref(), Some(MISSING_HOME_ERROR));
        assert!(output.pages.is_empty());
    }

    #[test]
    fn test_empty_files_are_omitted() {
        let outcome = CrawlOutcome {
            files: SpecialFilesBlock::default(),
            ..successful()
        };
        let output = assemble(&config(), now_iso(), outcome);
        assert!(output.files.is_none());
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("files").is_none());
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_persist_writes_once_to_each_sink() {
        let store = MemoryBlobStore::new(Some("run-1"));
        let dataset = MemoryDataset::new();
        let output = failed_before_crawl(&config(), now_iso(), "browser-unavailable: refused");

        persist(&output, &store, &dataset).await.unwrap();

        let blobs = store.blobs();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].key, OUTPUT_KEY);
        assert_eq!(blobs[0].content_type, "application/json");
        let stored: RunOutput = serde_json::from_slice(&blobs[0].bytes).unwrap();
        assert_eq!(stored, output);
        assert_eq!(dataset.documents(), vec![output]);
    }
}
