use crate::utils::is_internal_url;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Elements whose targets are loaded or linked from another host
const OUTBOUND_SOURCES: [(&str, &str); 4] = [
    ("a[href]", "href"),
    ("script[src]", "src"),
    (r#"link[rel="stylesheet"][href]"#, "href"),
    ("iframe[src]", "src"),
];

/// Extracts the raw `href` of every anchor in the document, in document order
pub fn parse_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);

    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let links = doc
        .select(&link_selector)
        .filter_map(|e| e.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(|s| s.to_string())
        .collect::<Vec<String>>();

    ::log::debug!("HTML parser found {} links", links.len());
    if !links.is_empty() {
        ::log::trace!(
            "First few links: {:?}",
            links.iter().take(5).collect::<Vec<_>>()
        );
    }

    links
}

/// Reads the `<base href>` of the document, if any
pub fn base_href(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("base[href]").ok()?;
    doc.select(&selector)
        .next()
        .and_then(|e| e.value().attr("href"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Hosts outside `base_domain` that the document links to or loads from, sorted and unique.
///
/// Relative references are resolved against `base`; only http(s) targets count.
pub fn outbound_domains(html: &str, base: &Url, base_domain: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut hosts = BTreeSet::new();

    for (selector, attr) in OUTBOUND_SOURCES {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for value in doc.select(&selector).filter_map(|e| e.value().attr(attr)) {
            let Ok(target) = base.join(value.trim()) else {
                continue;
            };
            if target.scheme() != "http" && target.scheme() != "https" {
                continue;
            }
            if is_internal_url(target.as_str(), base_domain) {
                continue;
            }
            if let Some(host) = target.host_str() {
                hosts.insert(host.to_ascii_lowercase());
            }
        }
    }

    hosts.into_iter().collect()
}
