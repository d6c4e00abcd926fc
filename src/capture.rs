//! The homepage visual-capture sequence.
//!
//! Runs once per snapshot against the already-loaded homepage: settle, wait for above-the-fold
//! media, screenshot, dismiss consent, scroll, screenshot again, read title and description.
//! Only a failure to rasterize a screenshot or a lost browser session aborts the sequence;
//! everything else degrades to a note.

use crate::browser::BrowserPage;
use crate::config::RunConfig;
use crate::consent::dismiss_consent;
use crate::error::{BrowserError, ExtractionError};
use crate::results::{HomeSnapshot, RedirectHop};
use crate::store::BlobStore;
use crate::utils::{now_iso, truncate};
use serde::Deserialize;
use std::time::Duration;

pub const SCREENSHOT_CONTENT_TYPE: &str = "image/png";

const MEDIA_READY_SCRIPT: &str = r#"
const videos = Array.from(document.querySelectorAll('video'));
const imgs = Array.from(document.querySelectorAll('img'));
return {
  videoCount: videos.length,
  imgCount: imgs.length,
  videoOk: videos.every((v) => v.readyState >= 2 || v.networkState === 3),
  imgOk: imgs.every((img) => img.complete)
};
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaReadiness {
    #[serde(default)]
    video_ok: bool,
    #[serde(default)]
    img_ok: bool,
}

/// What the homepage visit already established before capture starts
#[derive(Debug, Clone)]
pub struct HomeVisit {
    pub url: String,
    pub final_url: Option<String>,
    pub status: Option<u16>,
    pub redirect_chain: Vec<RedirectHop>,
    pub started_at: String,
    /// HTML was expected for this page but could not be read
    pub html_missing: bool,
}

/// Blob key of the `n`th homepage screenshot
pub fn screenshot_key(hotel_id: &str, n: u8) -> String {
    format!("home-mobile-{hotel_id}-{n}.png")
}

/// Polls the page until every video can play and every image is complete.
pub async fn wait_for_media(page: &dyn BrowserPage, timeout_ms: u64, poll_ms: u64) -> Result<(), ExtractionError> {
    let polls = if timeout_ms == 0 || poll_ms == 0 {
        1
    } else {
        (timeout_ms / poll_ms).max(1)
    };

    for attempt in 0..polls {
        match page.evaluate(MEDIA_READY_SCRIPT).await {
            Ok(value) => {
                if let Ok(ready) = serde_json::from_value::<MediaReadiness>(value) {
                    if ready.video_ok && ready.img_ok {
                        return Ok(());
                    }
                }
            }
            Err(e) => ::log::trace!("Media readiness check failed: {}", e),
        }
        if attempt + 1 < polls {
            page.wait(poll_ms).await;
        }
    }

    Err(ExtractionError::Timeout { step: "media-wait" })
}

async fn extract_title(page: &dyn BrowserPage) -> Result<String, ExtractionError> {
    match page.title().await {
        Ok(title) if !title.trim().is_empty() => Ok(title.trim().to_string()),
        Ok(_) => Err(ExtractionError::Missing { step: "title" }),
        Err(e) => Err(ExtractionError::Failed {
            step: "title",
            reason: e.to_string(),
        }),
    }
}

async fn extract_meta_description(page: &dyn BrowserPage) -> Result<String, ExtractionError> {
    match page.query_attribute(r#"meta[name="description"]"#, "content").await {
        Ok(Some(content)) if !content.trim().is_empty() => Ok(content.trim().to_string()),
        Ok(_) => Err(ExtractionError::Missing {
            step: "meta-description",
        }),
        Err(e) => Err(ExtractionError::Failed {
            step: "meta-description",
            reason: e.to_string(),
        }),
    }
}

/// Turns a soft browser failure into a note, passing lost sessions through.
fn soften(result: Result<(), BrowserError>, step: &str, notes: &mut Vec<String>) -> Result<(), BrowserError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_unrecoverable() => Err(e),
        Err(e) => {
            notes.push(format!("{step}:{}", truncate(&e.to_string(), 200)));
            Ok(())
        }
    }
}

fn keep<T>(result: Result<T, ExtractionError>, notes: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            notes.push(e.note());
            None
        }
    }
}

/// Takes a viewport screenshot and stores it. Store failures become notes.
async fn take_screenshot(
    page: &dyn BrowserPage,
    store: &dyn BlobStore,
    key: &str,
    notes: &mut Vec<String>,
) -> Result<Option<String>, BrowserError> {
    let bytes = page.screenshot().await?;
    match store.put(key, &bytes, SCREENSHOT_CONTENT_TYPE).await {
        Ok(reference) => {
            ::log::debug!("Stored screenshot {} ({} bytes)", key, bytes.len());
            Ok(Some(reference))
        }
        Err(e) => {
            ::log::warn!("Failed to store screenshot {}: {}", key, e);
            notes.push(format!("screenshot-store-failed:{key}"));
            Ok(None)
        }
    }
}

/// Runs the capture sequence against the loaded homepage.
pub async fn capture_home(
    page: &dyn BrowserPage,
    store: &dyn BlobStore,
    config: &RunConfig,
    visit: HomeVisit,
) -> Result<HomeSnapshot, BrowserError> {
    let settings = &config.capture;
    let mut notes = Vec::new();
    ::log::info!("Capturing homepage {}", visit.url);

    soften(page.scroll_to_top().await, "scroll-reset", &mut notes)?;
    page.wait(settings.settle_ms).await;

    if let Err(e) = wait_for_media(page, settings.media_timeout_ms, settings.media_poll_ms).await {
        ::log::debug!("Media not ready before first screenshot: {}", e);
        notes.push(e.note());
    }

    let key_1 = screenshot_key(&config.hotel_id, 1);
    let screenshot_ref_1 = take_screenshot(page, store, &key_1, &mut notes).await?;

    let consent_log = if config.try_dismiss_consent {
        dismiss_consent(page, Duration::from_millis(settings.consent_click_timeout_ms)).await
    } else {
        Vec::new()
    };

    let dy = (f64::from(config.viewport.height) * settings.scroll_ratio).floor() as i64;
    soften(page.scroll_by(dy).await, "scroll", &mut notes)?;
    page.wait(settings.post_scroll_settle_ms).await;

    let key_2 = screenshot_key(&config.hotel_id, 2);
    let screenshot_ref_2 = take_screenshot(page, store, &key_2, &mut notes).await?;
    notes.push(format!("second-screenshot:{key_2}"));

    let title = keep(extract_title(page).await, &mut notes);
    let meta_description = keep(extract_meta_description(page).await, &mut notes);

    if visit.html_missing {
        notes.push("home-html-missing".to_string());
    }
    if store.store_id().is_none() {
        notes.push("kvs-id-missing".to_string());
    }

    Ok(HomeSnapshot {
        url: visit.url,
        final_url: visit.final_url,
        viewport: config.viewport.clone(),
        started_at: visit.started_at,
        finished_at: now_iso(),
        status: visit.status,
        redirect_chain: visit.redirect_chain,
        consent_attempted: config.try_dismiss_consent,
        consent_log,
        screenshot_ref_1,
        screenshot_ref_2,
        screenshot_content_type: SCREENSHOT_CONTENT_TYPE.to_string(),
        title,
        meta_description,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_keys_are_deterministic() {
        assert_eq!(screenshot_key("H1", 1), "home-mobile-H1-1.png");
        assert_eq!(screenshot_key("H1", 2), "home-mobile-H1-2.png");
    }

    #[test]
    fn test_soften_keeps_session_loss_fatal() {
        let mut notes = Vec::new();
        assert!(soften(Err(BrowserError::Script("boom".into())), "scroll", &mut notes).is_ok());
        assert_eq!(notes, vec!["scroll:script evaluation failed: boom"]);

        let lost = soften(Err(BrowserError::SessionLost("gone".into())), "scroll", &mut notes);
        assert!(matches!(lost, Err(BrowserError::SessionLost(_))));
        assert_eq!(notes.len(), 1);
    }
}
