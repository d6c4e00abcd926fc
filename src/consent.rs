//! Best-effort dismissal of cookie/consent banners.
//!
//! Candidates are tried in order: accept-button phrases in the languages hotel sites commonly
//! use, then language-agnostic attribute patterns. Only candidates that exist on the page are
//! clicked, and the first successful click ends the attempt. A log without a success does not
//! mean there was no banner.

use crate::browser::{BrowserPage, ElementQuery};
use crate::results::{ConsentActionType, ConsentLogEntry};
use crate::utils::now_iso;
use std::collections::HashSet;
use std::time::Duration;

/// Accept-button phrases, grouped by language
pub const ACCEPT_PHRASES: &[&str] = &[
    // English
    "Accept",
    "Accept all",
    "Allow all",
    "Agree",
    "I agree",
    "OK",
    "Got it",
    // German
    "Akzeptieren",
    "Alle akzeptieren",
    "Zustimmen",
    "Einverstanden",
    // French
    "Accepter",
    "Tout accepter",
    "J'accepte",
    "D'accord",
    // Spanish
    "Aceptar",
    "Aceptar todo",
    "Estoy de acuerdo",
    "De acuerdo",
    // Danish
    "Accepter alle",
    // Dutch
    "Accepteren",
    "Alles accepteren",
    "Akkoord",
    // Italian
    "Accetta",
    "Accetta tutto",
    "Accetto",
    // Russian
    "Принять",
    "Принять все",
    "Согласен",
    "Я согласен",
    "ОК",
    // Hebrew
    "אישור",
    "מאשר",
    "אני מסכים",
    "קבל",
    "קבל הכל",
    "אישור הכל",
];

/// Attribute patterns tried after every phrase
pub const ATTRIBUTE_FALLBACKS: &[&str] = &[
    r#"[aria-label*="accept" i]"#,
    r#"[id*="accept" i]"#,
    r#"[class*="accept" i]"#,
];

const CLICK_LABEL: &str = "consent-click";

/// The ordered candidate list, without duplicates
pub fn consent_candidates() -> Vec<ElementQuery> {
    let mut seen = HashSet::new();
    ACCEPT_PHRASES
        .iter()
        .filter(|p| seen.insert(**p))
        .map(|p| ElementQuery::button_text(p))
        .chain(ATTRIBUTE_FALLBACKS.iter().map(|s| ElementQuery::css(s)))
        .collect()
}

fn click_entry(query: &ElementQuery, ok: bool, error: Option<String>, duration: Duration) -> ConsentLogEntry {
    let text_match = match query {
        ElementQuery::ButtonText(text) => Some(text.clone()),
        ElementQuery::Css(_) => None,
    };
    ConsentLogEntry {
        at: now_iso(),
        action: ConsentActionType::Click,
        label: CLICK_LABEL.to_string(),
        selector: Some(query.describe()),
        text_match,
        duration_ms: Some(duration.as_millis() as u64),
        ok,
        error,
    }
}

/// Tries to dismiss a consent overlay on `page`. Never fails; every click attempt is logged.
pub async fn dismiss_consent(page: &dyn BrowserPage, click_timeout: Duration) -> Vec<ConsentLogEntry> {
    let mut log = Vec::new();

    for query in consent_candidates() {
        match page.locator_count(&query).await {
            Ok(0) => continue,
            Ok(_) => {}
            Err(e) => {
                ::log::trace!("Consent candidate {} not queryable: {}", query.describe(), e);
                continue;
            }
        }

        let started = std::time::Instant::now();
        match page.click(&query, click_timeout).await {
            Ok(()) => {
                ::log::info!("Dismissed consent banner via {}", query.describe());
                log.push(click_entry(&query, true, None, started.elapsed()));
                return log;
            }
            Err(e) => {
                ::log::debug!("Consent click on {} failed: {}", query.describe(), e);
                log.push(click_entry(&query, false, Some(e.to_string()), started.elapsed()));
            }
        }
    }

    if log.is_empty() {
        ::log::debug!("No consent candidates found on page");
    }
    log
}
