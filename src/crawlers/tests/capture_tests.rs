use super::mock_page::{MockPage, MockResponse};
use crate::browser::BrowserPage;
use crate::capture::{HomeVisit, capture_home, wait_for_media};
use crate::config::{CaptureSettings, RunConfig, RunInput};
use crate::consent::dismiss_consent;
use crate::error::ExtractionError;
use crate::store::MemoryBlobStore;
use crate::utils::now_iso;
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "https://example.com/";

    fn config(input: RunInput) -> RunConfig {
        RunConfig::from_input(&input)
            .unwrap()
            .with_capture(CaptureSettings::immediate())
    }

    fn visit() -> HomeVisit {
        HomeVisit {
            url: HOME.to_string(),
            final_url: Some(HOME.to_string()),
            status: Some(200),
            redirect_chain: Vec::new(),
            started_at: now_iso(),
            html_missing: false,
        }
    }

    async fn loaded(page: MockPage) -> MockPage {
        page.navigate(HOME, Duration::from_secs(1)).await.unwrap();
        page
    }

    #[tokio::test]
    async fn test_media_wait_times_out_into_note() {
        let page = loaded(MockPage::new().with_response(HOME, MockResponse::html(200, "<p>hi</p>")).with_pending_media()).await;
        assert_eq!(
            wait_for_media(&page, 1_000, 250).await,
            Err(ExtractionError::Timeout { step: "media-wait" })
        );
        let polls = page.events().iter().filter(|e| *e == "evaluate").count();
        assert_eq!(polls, 4);

        let store = MemoryBlobStore::new(Some("kvs"));
        let snapshot = capture_home(&page, &store, &config(RunInput::new("H1", "example.com")), visit())
            .await
            .unwrap();
        assert!(snapshot.notes.contains(&"media-wait:timeout".to_string()));
        assert!(snapshot.screenshot_ref_1.is_some() && snapshot.screenshot_ref_2.is_some());
    }

    #[tokio::test]
    async fn test_missing_extractions_become_notes() {
        let page = loaded(MockPage::new().with_response(HOME, MockResponse::html(200, "<p>hi</p>"))).await;
        let store = MemoryBlobStore::new(None);
        let visit = HomeVisit {
            html_missing: true,
            ..visit()
        };

        let snapshot = capture_home(&page, &store, &config(RunInput::new("H1", "example.com")), visit)
            .await
            .unwrap();
        assert!(snapshot.title.is_none());
        assert!(snapshot.meta_description.is_none());
        for note in ["title:missing", "meta-description:missing", "home-html-missing", "kvs-id-missing"] {
            assert!(snapshot.notes.contains(&note.to_string()), "missing note {note}");
        }
        assert_eq!(snapshot.screenshot_ref_1.as_deref(), Some("memory:home-mobile-H1-1.png"));
    }

    #[tokio::test]
    async fn test_consent_skipped_when_disabled() {
        let page = loaded(
            MockPage::new()
                .with_response(HOME, MockResponse::html(200, "<p>hi</p>"))
                .with_consent_button("Accept"),
        )
        .await;
        let store = MemoryBlobStore::new(Some("kvs"));
        let input = RunInput {
            try_dismiss_consent: false,
            ..RunInput::new("H1", "example.com")
        };

        let snapshot = capture_home(&page, &store, &config(input), visit()).await.unwrap();
        assert!(!snapshot.consent_attempted);
        assert!(snapshot.consent_log.is_empty());
        assert!(!page.events().iter().any(|e| e.starts_with("click:")));
    }

    #[tokio::test]
    async fn test_failed_click_moves_to_next_candidate() {
        let page = MockPage::new()
            .with_stuck_consent_button("Accept")
            .with_consent_button("Akzeptieren");

        let log = dismiss_consent(&page, Duration::from_millis(1_500)).await;
        assert_eq!(log.len(), 2);
        assert!(!log[0].ok);
        assert_eq!(log[0].error.as_deref(), Some("timeout after 1500 ms"));
        assert!(log[1].ok);
        assert_eq!(log[1].text_match.as_deref(), Some("Akzeptieren"));
    }

    #[tokio::test]
    async fn test_no_banner_means_no_clicks() {
        let page = MockPage::new();
        let log = dismiss_consent(&page, Duration::from_millis(1_500)).await;
        assert!(log.is_empty());
        assert!(page.events().is_empty());
    }

    #[tokio::test]
    async fn test_custom_viewport_scroll_distance() {
        let page = loaded(MockPage::new().with_response(HOME, MockResponse::html(200, "<p>hi</p>"))).await;
        let store = MemoryBlobStore::new(Some("kvs"));
        let input = RunInput::from_json(r#"{"hotelId":"H1","domain":"example.com","homeMobileViewport":{"height":700}}"#)
            .unwrap();

        let snapshot = capture_home(&page, &store, &config(input), visit()).await.unwrap();
        assert_eq!(snapshot.viewport.height, 700);
        assert!(page.events().contains(&"scroll_by:630".to_string()));
    }
}
